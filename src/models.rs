use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identity ───────────────────────────────────────────────────────────────

/// Account role. Only these two values exist on the wire and in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role '{0}': must be 'admin' or 'user'")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(InvalidRole(other.to_owned())),
        }
    }
}

/// Read projection of a registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A row of the admin user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// ── Links & clicks ─────────────────────────────────────────────────────────

/// A shortened link as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShortLink {
    pub id: Uuid,
    pub original_url: String,
    pub short_code: String,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShortLink {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// One recorded follow of a short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClickEvent {
    pub clicked_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Per-link statistics: the link itself plus its most recent clicks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    #[serde(flatten)]
    pub link: ShortLink,
    pub recent_clicks: Vec<ClickEvent>,
}

/// Entry of the platform-wide top links table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopLink {
    pub short_code: String,
    pub original_url: String,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view over every link, click and user, computed at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_urls: i64,
    pub total_clicks: i64,
    pub total_users: i64,
    pub urls_today: i64,
    pub clicks_today: i64,
    pub top_urls: Vec<TopLink>,
}

/// Number of entries in `PlatformStats::top_urls`.
pub const TOP_LINKS: usize = 10;

/// Number of entries in `LinkStats::recent_clicks`.
pub const RECENT_CLICKS: usize = 10;

/// Order top links by click count, most clicked first; equal counts go to the
/// link created earliest.
pub fn rank_top_links(links: &mut [TopLink]) {
    links.sort_by(|a, b| {
        b.click_count
            .cmp(&a.click_count)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

// ── Request / response bodies ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ── Validation ─────────────────────────────────────────────────────────────

/// Check that `raw` is an absolute http(s) URL with a host and return it
/// trimmed. Both the client (before any request) and the server run this.
pub fn validate_original_url(raw: &str) -> Result<String, String> {
    let url = raw.trim();
    if url.is_empty() {
        return Err("URL must not be empty.".into());
    }

    let parsed = Url::parse(url).map_err(|e| format!("'{url}' is not a valid URL: {e}"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("URL must start with http:// or https://".into());
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err("URL must include a host.".into());
    }

    Ok(url.to_owned())
}

/// Minimal shape check for an email address. Returns the trimmed, lowercased
/// form that accounts are stored and looked up under.
pub fn validate_email(raw: &str) -> Result<String, String> {
    let email = normalize_email(raw);
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err("Enter a valid email address.".into()),
    }
}

/// Emails are case-insensitive identifiers.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
