use crate::server::{
    cache::Target,
    db,
    error::{ApiError, ApiResult},
    AppState,
};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    response::Redirect,
};
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc};

/// GET /:code
///
/// 1. Check the in-memory cache for the short code (fast path, no DB hit).
/// 2. On a cache miss, fall back to the database.
/// 3. Spawn a background task to record the click so the redirect is not
///    blocked by the analytics write.
/// 4. Redirect to the original URL.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Redirect> {
    // ── 1. Resolve target ──────────────────────────────────────────────────
    let target = match state.cache.get(&code) {
        Some(target) => target,
        None => {
            let record = db::get_link_by_code(&state.db, &code)
                .await?
                .ok_or(ApiError::NotFound("Short link not found"))?;
            // Backfill the cache for next time
            state.cache.set(record.link.clone());
            Target {
                link_id: record.link.id,
                original_url: record.link.original_url,
                expires_at: record.link.expires_at,
            }
        }
    };

    if target.is_expired_at(Utc::now()) {
        return Err(ApiError::Gone("Short link has expired"));
    }

    // ── 2. Extract request metadata ────────────────────────────────────────
    let ip = extract_ip(&headers, addr);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // ── 3. Log the click in the background ─────────────────────────────────
    let state_bg = state.clone();
    let link_id = target.link_id;
    tokio::spawn(async move {
        match db::record_click(&state_bg.db, link_id, ip.as_deref(), user_agent.as_deref()).await
        {
            Ok(true) => {}
            Ok(false) => {
                // A redirect racing a delete can re-cache the deleted link.
                state_bg.cache.evict_link(&code, link_id);
                tracing::warn!(
                    "Click logging: link '{}' disappeared between redirect and log",
                    code
                );
            }
            Err(e) => tracing::error!("Click logging DB error for '{}': {:?}", code, e),
        }
    });

    // ── 4. Redirect ────────────────────────────────────────────────────────
    Ok(Redirect::to(&target.original_url))
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Determine the real client IP, preferring common proxy headers.
fn extract_ip(headers: &HeaderMap, addr: SocketAddr) -> Option<String> {
    // X-Forwarded-For can be a comma-separated list; take the first entry.
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = xff.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_owned());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return Some(real_ip.to_owned());
        }
    }

    Some(addr.ip().to_string())
}
