use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed input, detected before any request is sent where possible.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials, duplicate registration, or an operation that needs a
    /// signed-in session while none exists.
    #[error("{0}")]
    Auth(String),

    /// A previously valid credential was rejected. The session has already
    /// been moved to anonymous when this is returned.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    /// Signed in, but not the owner of the target or not an administrator.
    #[error("{0}")]
    Permission(String),

    /// The target entity does not exist (or no longer exists).
    #[error("{0}")]
    NotFound(String),

    /// Transport or backend failure.
    #[error("{0}")]
    Service(String),

    /// The session changed while the request was in flight; its result was
    /// discarded instead of being applied to the new session.
    #[error("The request was superseded by a change of session.")]
    Superseded,
}

impl Error {
    /// Text suitable for showing next to the control that triggered the call.
    pub fn user_message(&self) -> String {
        match self {
            Error::Service(detail) => {
                tracing::debug!(%detail, "service failure");
                "Something went wrong talking to the server. Please try again.".to_owned()
            }
            Error::Superseded => "Please try again.".to_owned(),
            other => other.to_string(),
        }
    }

    /// Whether this failure is the result of a credential being rejected.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::SessionExpired)
    }

    pub(crate) fn not_signed_in() -> Self {
        Error::Auth("You need to sign in first.".into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Service(format!("unexpected response from server: {err}"))
        } else {
            Error::Service(format!("request failed: {err}"))
        }
    }
}
