use crate::{
    models::{LinkStats, PlatformStats, RECENT_CLICKS, TOP_LINKS},
    server::{
        auth::{AdminUser, AuthUser},
        db,
        error::{ApiError, ApiResult},
        AppState,
    },
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Widest real-world UTC offset, in minutes.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Deserialize)]
pub struct PlatformStatsQuery {
    /// The caller's local UTC offset (east positive). "Today" is the caller's
    /// calendar day, not the server's.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// GET /api/stats/:short_code
/// Link details plus the most recent clicks. Owner or admin only.
pub async fn link_stats(
    AuthUser(identity): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(short_code): Path<String>,
) -> ApiResult<Json<LinkStats>> {
    let record = db::get_link_by_code(&state.db, &short_code)
        .await?
        .ok_or(ApiError::NotFound("Short URL not found"))?;

    if record.user_id != Some(identity.id) && !identity.is_admin() {
        return Err(ApiError::Forbidden(
            "You don't have permission to view these stats",
        ));
    }

    let recent_clicks = db::recent_clicks(&state.db, record.link.id, RECENT_CLICKS).await?;

    Ok(Json(LinkStats {
        link: record.link,
        recent_clicks,
    }))
}

/// GET /api/admin/stats
pub async fn platform_stats(
    AdminUser(_admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlatformStatsQuery>,
) -> ApiResult<Json<PlatformStats>> {
    let minutes = query.utc_offset_minutes.unwrap_or(0);
    let offset = utc_offset(minutes).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "utc_offset_minutes must be between -{MAX_OFFSET_MINUTES} and {MAX_OFFSET_MINUTES}"
        ))
    })?;

    let (day_start, day_end) = day_bounds(Utc::now(), offset);
    let stats = db::platform_stats(&state.db, day_start, day_end, TOP_LINKS).await?;

    Ok(Json(stats))
}

fn utc_offset(minutes: i32) -> Option<FixedOffset> {
    if minutes.abs() > MAX_OFFSET_MINUTES {
        return None;
    }
    FixedOffset::east_opt(minutes * 60)
}

/// The UTC instants bounding the calendar day that contains `now` in the
/// given zone, as a half-open range `[start, end)`.
pub fn day_bounds(now: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::MIN);
    let start = Utc.from_utc_datetime(
        &(local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))),
    );
    (start, start + Duration::days(1))
}
