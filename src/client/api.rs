use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{
        CreateLinkRequest, Credentials, Identity, LinkStats, LoginResponse, PlatformStats,
        RoleUpdate, ShortLink, UserSummary,
    },
};

/// How a failed response should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Sign-in and registration: every client error is a credential problem.
    Public,
    /// Calls that carry (or may carry) a bearer token.
    Bearer,
}

#[derive(Debug, Clone)]
pub struct Api {
    pub http: Client,
    pub base_url: String,
}

impl Api {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Exchanges email and password for a bearer token.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let request = self.http.post(self.endpoint(&["auth", "login"])?).json(credentials);
        Self::fetch(request, Scope::Public).await
    }

    /// Creates an account. Does not sign in.
    pub async fn register(&self, credentials: &Credentials) -> Result<()> {
        let request = self
            .http
            .post(self.endpoint(&["auth", "register"])?)
            .json(credentials);
        Self::send(request, Scope::Public).await.map(drop)
    }

    /// Resolves the identity behind a token.
    pub async fn me(&self, token: &str) -> Result<Identity> {
        let request = self
            .http
            .get(self.endpoint(&["auth", "me"])?)
            .bearer_auth(token);
        Self::fetch(request, Scope::Bearer).await
    }

    /// Lists the caller's links, newest first.
    pub async fn list_links(&self, token: &str) -> Result<Vec<ShortLink>> {
        let request = self.http.get(self.endpoint(&["shorten"])?).bearer_auth(token);
        Self::fetch(request, Scope::Bearer).await
    }

    /// Creates a link, attributed to the token's owner when a token is given.
    pub async fn create_link(
        &self,
        token: Option<&str>,
        payload: &CreateLinkRequest,
    ) -> Result<ShortLink> {
        let mut request = self.http.post(self.endpoint(&["shorten"])?).json(payload);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Self::fetch(request, Scope::Bearer).await
    }

    /// Deletes an owned link.
    pub async fn delete_link(&self, token: &str, id: Uuid) -> Result<()> {
        let request = self
            .http
            .delete(self.endpoint(&["shorten", &id.to_string()])?)
            .bearer_auth(token);
        Self::send(request, Scope::Bearer).await.map(drop)
    }

    /// Per-link stats with the most recent clicks.
    pub async fn link_stats(&self, token: &str, short_code: &str) -> Result<LinkStats> {
        let request = self
            .http
            .get(self.endpoint(&["stats", short_code])?)
            .bearer_auth(token);
        Self::fetch(request, Scope::Bearer).await
    }

    /// Every account (admin only).
    pub async fn list_users(&self, token: &str) -> Result<Vec<UserSummary>> {
        let request = self.http.get(self.endpoint(&["users"])?).bearer_auth(token);
        Self::fetch(request, Scope::Bearer).await
    }

    /// Changes an account's role (admin only).
    pub async fn set_role(&self, token: &str, user_id: i64, role: &str) -> Result<Identity> {
        let request = self
            .http
            .put(self.endpoint(&["users", &user_id.to_string(), "role"])?)
            .bearer_auth(token)
            .json(&RoleUpdate {
                role: role.to_owned(),
            });
        Self::fetch(request, Scope::Bearer).await
    }

    /// Platform totals; "today" is the calendar day at `utc_offset_minutes`.
    pub async fn platform_stats(
        &self,
        token: &str,
        utc_offset_minutes: i32,
    ) -> Result<PlatformStats> {
        let request = self
            .http
            .get(self.endpoint(&["admin", "stats"])?)
            .query(&[("utc_offset_minutes", utc_offset_minutes)])
            .bearer_auth(token);
        Self::fetch(request, Scope::Bearer).await
    }

    /// `{base_url}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Service(format!("invalid API URL '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Service(format!("API URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder, scope: Scope) -> Result<T> {
        let response = Self::send(request, scope).await?;
        Ok(response.json().await?)
    }

    async fn send(request: RequestBuilder, scope: Scope) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("API request failed: {}", e);
            Error::from(e)
        })?;
        Self::check_response(response, scope).await
    }

    async fn check_response(response: Response, scope: Scope) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::debug!(%status, %message, "API call rejected");

        Err(classify(status, message, scope))
    }
}

/// Pull a human-readable message out of an error body: the JSON `message` or
/// `error` field, else the raw body, else the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_owned()
            } else {
                body.to_owned()
            }
        })
}

/// Map a failed status onto the client error taxonomy.
pub fn classify(status: StatusCode, message: String, scope: Scope) -> Error {
    match (scope, status) {
        (Scope::Public, s) if s.is_client_error() => Error::Auth(message),
        (Scope::Bearer, StatusCode::UNAUTHORIZED) => Error::SessionExpired,
        (_, StatusCode::FORBIDDEN) => Error::Permission(message),
        (_, StatusCode::NOT_FOUND | StatusCode::GONE) => Error::NotFound(message),
        (_, StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY) => {
            Error::Validation(message)
        }
        _ => Error::Service(format!("{status}: {message}")),
    }
}
