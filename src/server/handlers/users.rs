use crate::{
    models::{Identity, Role, RoleUpdate, UserSummary},
    server::{
        auth::AdminUser,
        db,
        error::{ApiError, ApiResult},
        AppState,
    },
};
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

/// GET /api/users
pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(db::list_users(&state.db).await?))
}

/// PUT /api/users/:id/role
///
/// An administrator cannot change their own role.
pub async fn set_role(
    AdminUser(actor): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<RoleUpdate>,
) -> ApiResult<Json<Identity>> {
    let role: Role = body
        .role
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid role. Must be 'admin' or 'user'".into()))?;

    if id == actor.id {
        return Err(ApiError::Forbidden("You cannot change your own role."));
    }

    let updated = db::set_role(&state.db, id, role)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    tracing::info!(actor = actor.id, target = id, role = %role, "Role changed");
    Ok(Json(updated))
}
