use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::MessageResponse;

/// Error returned by every API handler. Rendered as `{"message": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// Internal errors - logged but return generic 500 to the caller
    Internal(anyhow::Error),
    /// 400 with a message that is safe to show
    BadRequest(String),
    /// 401: missing, malformed, expired or otherwise rejected credential
    Unauthorized(&'static str),
    /// 403: authenticated but not allowed
    Forbidden(&'static str),
    /// 404
    NotFound(&'static str),
    /// 410: the link exists but has expired
    Gone(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                "Internal server error".to_owned()
            }
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Gone(msg) => msg.to_owned(),
        };

        (status, Json(MessageResponse { message })).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
