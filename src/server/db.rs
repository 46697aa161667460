use crate::{
    models::{ClickEvent, Identity, PlatformStats, Role, ShortLink, TopLink, UserSummary},
    server::cache::LinkCache,
};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use uuid::Uuid;

const LINK_COLUMNS: &str = "id, original_url, short_code, click_count, created_at, expires_at";

/// A link row together with the id of the account that owns it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkRecord {
    #[sqlx(flatten)]
    pub link: ShortLink,
    pub user_id: Option<i64>,
}

/// A user row including the stored password hash. Never leaves the server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    #[sqlx(flatten)]
    pub identity: Identity,
    pub password_hash: String,
}

// ── Pool ───────────────────────────────────────────────────────────────────

/// Open the SQLite pool and apply the embedded migrations.
///
/// An in-memory database only lives as long as its connection, so
/// `sqlite::memory:` URLs are pinned to a single pooled connection.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    let options = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .foreign_keys(true);
    let options = if in_memory {
        options
    } else {
        options.journal_mode(SqliteJournalMode::Wal)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 10 })
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

// ── Warm-up ────────────────────────────────────────────────────────────────

/// Load every unexpired link into the in-memory cache at startup.
pub async fn warm_cache(pool: &SqlitePool, cache: &LinkCache) -> anyhow::Result<()> {
    let links: Vec<ShortLink> = sqlx::query_as(&format!(
        "SELECT {LINK_COLUMNS} FROM links WHERE expires_at IS NULL OR expires_at > ?1"
    ))
    .bind(Utc::now())
    .fetch_all(pool)
    .await?;

    let count = links.len();
    for link in links {
        cache.set(link);
    }

    tracing::info!("Cache warmed with {} active link(s)", count);
    Ok(())
}

// ── Users ──────────────────────────────────────────────────────────────────

/// Insert a new account and return its identity.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<Identity, sqlx::Error> {
    let id = sqlx::query(
        "INSERT INTO users (email, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Identity {
        id,
        email: email.to_owned(),
        role,
    })
}

pub async fn get_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as("SELECT id, email, role, password_hash FROM users WHERE email = ?1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn get_identity(pool: &SqlitePool, id: i64) -> Result<Option<Identity>, sqlx::Error> {
    sqlx::query_as("SELECT id, email, role FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Every account, oldest first.
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as("SELECT id, email, role, created_at FROM users ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Change an account's role. Returns `None` when the account does not exist.
pub async fn set_role(
    pool: &SqlitePool,
    id: i64,
    role: Role,
) -> Result<Option<Identity>, sqlx::Error> {
    let affected = sqlx::query("UPDATE users SET role = ?1 WHERE id = ?2")
        .bind(role)
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    if affected == 0 {
        return Ok(None);
    }
    get_identity(pool, id).await
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}

// ── Links ──────────────────────────────────────────────────────────────────

/// Insert a new link and return the newly created row.
pub async fn create_link(
    pool: &SqlitePool,
    short_code: &str,
    original_url: &str,
    user_id: Option<i64>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<ShortLink, sqlx::Error> {
    let link = ShortLink {
        id: Uuid::new_v4(),
        original_url: original_url.to_owned(),
        short_code: short_code.to_owned(),
        click_count: 0,
        created_at: Utc::now(),
        expires_at,
    };

    sqlx::query(
        "INSERT INTO links (id, original_url, short_code, user_id, click_count, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
    )
    .bind(link.id)
    .bind(&link.original_url)
    .bind(&link.short_code)
    .bind(user_id)
    .bind(link.created_at)
    .bind(link.expires_at)
    .execute(pool)
    .await?;

    Ok(link)
}

pub async fn short_code_exists(pool: &SqlitePool, short_code: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM links WHERE short_code = ?1")
        .bind(short_code)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Fetch a single link by its short code (expired or not).
pub async fn get_link_by_code(
    pool: &SqlitePool,
    short_code: &str,
) -> Result<Option<LinkRecord>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {LINK_COLUMNS}, user_id FROM links WHERE short_code = ?1"
    ))
    .bind(short_code)
    .fetch_optional(pool)
    .await
}

/// Fetch a single link by its primary key.
pub async fn get_link_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<LinkRecord>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {LINK_COLUMNS}, user_id FROM links WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// All links owned by `user_id`, newest first. Anonymous links never match.
pub async fn list_links_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<ShortLink>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {LINK_COLUMNS} FROM links
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Permanently delete a link (cascades to clicks via FK).
pub async fn delete_link(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let affected = sqlx::query("DELETE FROM links WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

// ── Clicks ─────────────────────────────────────────────────────────────────

/// Append a click event and bump the link's counter in one transaction, so
/// `click_count` always equals the number of stored events. Designed to be
/// called from a spawned background task so that the HTTP redirect is never
/// blocked by the analytics write.
pub async fn record_click(
    pool: &SqlitePool,
    link_id: Uuid,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let affected = sqlx::query("UPDATE links SET click_count = click_count + 1 WHERE id = ?1")
        .bind(link_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if affected == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO clicks (link_id, ip_address, user_agent, clicked_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(link_id)
    .bind(ip_address)
    .bind(user_agent)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// The `limit` most recent click events of one link, newest first.
pub async fn recent_clicks(
    pool: &SqlitePool,
    link_id: Uuid,
    limit: usize,
) -> Result<Vec<ClickEvent>, sqlx::Error> {
    sqlx::query_as(
        "SELECT clicked_at, ip_address, user_agent
         FROM clicks
         WHERE link_id = ?1
         ORDER BY clicked_at DESC, id DESC
         LIMIT ?2",
    )
    .bind(link_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
}

pub async fn count_clicks(pool: &SqlitePool, link_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM clicks WHERE link_id = ?1")
        .bind(link_id)
        .fetch_one(pool)
        .await
}

// ── Platform statistics ────────────────────────────────────────────────────

/// Totals over the whole platform, same-day counts for the half-open window
/// `[day_start, day_end)`, and the `top` most clicked links.
pub async fn platform_stats(
    pool: &SqlitePool,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
    top: usize,
) -> Result<PlatformStats, sqlx::Error> {
    let (total_urls, total_clicks): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(click_count), 0) FROM links")
            .fetch_one(pool)
            .await?;

    let total_users = count_users(pool).await?;

    let urls_today: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE created_at >= ?1 AND created_at < ?2")
            .bind(day_start)
            .bind(day_end)
            .fetch_one(pool)
            .await?;

    let clicks_today: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM clicks WHERE clicked_at >= ?1 AND clicked_at < ?2",
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_one(pool)
    .await?;

    let top_urls: Vec<TopLink> = sqlx::query_as(
        "SELECT short_code, original_url, click_count, created_at
         FROM links
         ORDER BY click_count DESC, created_at ASC, rowid ASC
         LIMIT ?1",
    )
    .bind(top as i64)
    .fetch_all(pool)
    .await?;

    Ok(PlatformStats {
        total_urls,
        total_clicks,
        total_users,
        urls_today,
        clicks_today,
        top_urls,
    })
}
