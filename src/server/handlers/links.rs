use crate::{
    models::{validate_original_url, CreateLinkRequest, ShortLink},
    server::{
        auth::{AuthUser, MaybeAuthUser},
        db,
        error::{ApiError, ApiResult},
        AppState,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// How many fresh codes to try before giving up on an insert.
const MAX_CODE_ATTEMPTS: usize = 10;

/// GET /api/shorten
/// The caller's own links, newest first.
pub async fn list_links(
    AuthUser(identity): AuthUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ShortLink>>> {
    let links = db::list_links_for_user(&state.db, identity.id).await?;
    Ok(Json(links))
}

/// POST /api/shorten
/// Attributed to the caller when a bearer token is present, unowned otherwise.
pub async fn create_link(
    MaybeAuthUser(identity): MaybeAuthUser,
    State(state): State<Arc<AppState>>,
    Json(form): Json<CreateLinkRequest>,
) -> ApiResult<(StatusCode, Json<ShortLink>)> {
    let url = validate_original_url(&form.original_url).map_err(ApiError::BadRequest)?;

    if let Some(expires_at) = form.expires_at {
        if expires_at <= Utc::now() {
            return Err(ApiError::BadRequest(
                "Expiry must be in the future.".into(),
            ));
        }
    }

    let owner = identity.as_ref().map(|i| i.id);
    let link = insert_with_unique_code(
        &state.db,
        state.config.short_code_length,
        random_code,
        &url,
        owner,
        form.expires_at,
    )
    .await?;

    // Update the cache immediately
    state.cache.set(link.clone());
    tracing::info!(
        short_code = %link.short_code,
        owner = ?owner,
        "Link created: {}/{}",
        state.config.site_url,
        link.short_code
    );

    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /api/shorten/:id
/// Only the owner may delete a link. Anonymous links have no owner.
pub async fn delete_link(
    AuthUser(identity): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    // Fetch the link first so we can check ownership and evict it from the cache
    let record = db::get_link_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Short URL not found"))?;

    if record.user_id != Some(identity.id) {
        tracing::warn!(user_id = identity.id, link = %id, "Refused delete of foreign link");
        return Err(ApiError::Forbidden(
            "You do not have permission to delete this link.",
        ));
    }

    if !db::delete_link(&state.db, id).await? {
        return Err(ApiError::NotFound("Short URL not found"));
    }

    state.cache.remove(&record.link.short_code);
    tracing::info!(short_code = %record.link.short_code, "Link deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ── Private helpers ────────────────────────────────────────────────────────

/// Insert the link under a random code that doesn't already exist. The UNIQUE
/// constraint is the real guard; a collision there just means another try.
async fn insert_with_unique_code(
    pool: &SqlitePool,
    base_len: usize,
    mut next_code: impl FnMut(usize) -> String,
    url: &str,
    owner: Option<i64>,
    expires_at: Option<DateTime<Utc>>,
) -> ApiResult<ShortLink> {
    for attempt in 0..MAX_CODE_ATTEMPTS {
        // Longer codes are even less likely to collide.
        let len = if attempt < MAX_CODE_ATTEMPTS / 2 {
            base_len
        } else {
            base_len + 2
        };
        let code = next_code(len);

        if db::short_code_exists(pool, &code).await? {
            continue;
        }

        match db::create_link(pool, &code, url, owner, expires_at).await {
            Ok(link) => return Ok(link),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::Internal(anyhow::anyhow!(
        "no unique short code after {MAX_CODE_ATTEMPTS} attempts"
    )))
}

/// Generate a random alphanumeric string of the given length.
pub(crate) fn random_code(len: usize) -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
