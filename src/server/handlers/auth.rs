use crate::{
    models::{normalize_email, validate_email, Credentials, Identity, LoginResponse, MessageResponse, Role},
    server::{
        auth::{hash_password, verify_password, AuthUser},
        db,
        error::{ApiError, ApiResult},
        AppState,
    },
};
use axum::{extract::State, http::StatusCode, Json};
use std::{sync::Arc, time::Duration};

/// POST /api/auth/register
///
/// Creates the account only; the caller signs in separately.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let email = validate_email(&form.email).map_err(ApiError::BadRequest)?;
    if form.password.is_empty() {
        return Err(ApiError::BadRequest("Password must not be empty.".into()));
    }

    if db::get_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::BadRequest(
            "A user with that email already exists.".into(),
        ));
    }

    let role = match &state.config.bootstrap_admin_email {
        Some(admin) if normalize_email(admin) == email => Role::Admin,
        _ => Role::User,
    };

    let password_hash = hash_password(form.password).await?;

    match db::create_user(&state.db, &email, &password_hash, role).await {
        Ok(identity) => {
            tracing::info!(user_id = identity.id, role = %identity.role, "Registered new user");
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse {
                    message: "User registered successfully".into(),
                }),
            ))
        }
        // Lost a race with a concurrent registration of the same email.
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ApiError::BadRequest(
            "A user with that email already exists.".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(form): Json<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let record = db::get_user_by_email(&state.db, &normalize_email(&form.email)).await?;

    let verified = match &record {
        Some(user) => verify_password(form.password, user.password_hash.clone()).await,
        None => false,
    };

    let Some(user) = record.filter(|_| verified) else {
        // Use a small artificial delay to blunt brute-force attempts.
        tokio::time::sleep(Duration::from_millis(250)).await;
        return Err(ApiError::Unauthorized("Invalid credentials"));
    };

    let token = state.tokens.issue(user.identity.id)?;
    tracing::info!(user_id = user.identity.id, "User signed in");

    Ok(Json(LoginResponse {
        token,
        user: user.identity,
    }))
}

/// GET /api/auth/me
pub async fn me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}
