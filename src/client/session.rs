use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;

use super::{
    api::Api,
    policy::{self, Decision, Route},
    store::CredentialStore,
};
use crate::{
    error::{Error, Result},
    models::{validate_email, Credentials, Identity},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup: a stored credential may exist but has not been checked yet.
    Unresolved,
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Counter identifying one identity epoch of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// Everything an authenticated request needs, captured at issue time.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub token: String,
    pub identity: Identity,
    pub generation: Generation,
}

struct Inner {
    state: SessionState,
    /// In-memory copy of the stored credential, present only while
    /// authenticated.
    token: Option<String>,
    generation: Generation,
}

/// Handle to the process-wide session. Clones share the same state.
///
/// Every identity transition bumps the [`Generation`]; responses come back
/// through [`Session::settle`] tagged with the generation they were issued under.
#[derive(Clone)]
pub struct Session {
    api: Api,
    store: Arc<dyn CredentialStore>,
    inner: Arc<RwLock<Inner>>,
}

impl Session {
    pub fn new(api: Api, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            api,
            store,
            inner: Arc::new(RwLock::new(Inner {
                state: SessionState::Unresolved,
                token: None,
                generation: Generation(0),
            })),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.read().state.identity().cloned()
    }

    pub fn generation(&self) -> Generation {
        self.inner.read().generation
    }

    /// Decide whether `route` may be shown right now.
    pub fn authorize(&self, route: Route) -> Decision {
        policy::evaluate(&self.inner.read().state, route.requirement())
    }

    // ── Transitions ────────────────────────────────────────────────────────

    /// Restore the session from the stored credential, if any.
    ///
    /// Any failure to resolve the identity discards the credential and leaves
    /// the session anonymous. If another transition (a login or logout) wins
    /// the race, that transition stands and its state is returned.
    pub async fn initialize(&self) -> SessionState {
        let generation = self.generation();

        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.resolve(generation, None);
                return self.state();
            }
            Err(e) => {
                tracing::warn!("Could not read stored credential: {:#}", e);
                self.resolve(generation, None);
                return self.state();
            }
        };

        if advisory_expired(&token) {
            tracing::info!("Stored credential has expired; starting signed out");
            self.discard_credential(generation);
            self.resolve(generation, None);
            return self.state();
        }

        match self.api.me(&token).await {
            Ok(identity) => {
                tracing::info!(user_id = identity.id, "Session restored");
                self.resolve(generation, Some((identity, token)));
            }
            Err(e) => {
                tracing::info!("Stored credential was not accepted: {}", e);
                self.discard_credential(generation);
                self.resolve(generation, None);
            }
        }
        self.state()
    }

    /// Sign in and make the resulting identity current.
    ///
    /// The credential is persisted only once the identity behind it has been
    /// resolved; on any failure the previous session is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::Auth("Email and password are required.".into()));
        }

        let generation = self.generation();
        let credentials = Credentials {
            email: email.to_owned(),
            password: password.to_owned(),
        };

        let response = self.api.login(&credentials).await?;

        let identity = match self.api.me(&response.token).await {
            Ok(identity) => identity,
            // A token rejected straight after issue is a sign-in failure,
            // not the expiry of a session we never had.
            Err(Error::SessionExpired) => {
                return Err(Error::Auth("The server rejected the new session.".into()))
            }
            Err(e) => return Err(e),
        };

        let mut inner = self.inner.write();
        if inner.generation != generation {
            return Err(Error::Superseded);
        }
        self.store.save(&response.token).map_err(|e| {
            tracing::error!("Could not persist credential: {:#}", e);
            Error::Service(format!("could not store credential: {e}"))
        })?;

        inner.state = SessionState::Authenticated(identity.clone());
        inner.token = Some(response.token);
        inner.generation = next(inner.generation);
        tracing::info!(user_id = identity.id, "Signed in");

        Ok(identity)
    }

    /// Create an account. Does not sign in; call [`Session::login`] afterwards.
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        let email = validate_email(email).map_err(Error::Auth)?;
        if password.is_empty() {
            return Err(Error::Auth("Password must not be empty.".into()));
        }

        self.api
            .register(&Credentials {
                email,
                password: password.to_owned(),
            })
            .await?;
        tracing::info!("Registered new account");
        Ok(())
    }

    /// Forget the credential and identity. Always succeeds; repeated calls
    /// are no-ops.
    pub fn logout(&self) {
        let mut inner = self.inner.write();
        self.sign_out(&mut inner);
    }

    /// Re-read the signed-in identity, e.g. after an admin changed its role.
    pub async fn refresh(&self) -> Result<Identity> {
        let ticket = self.ticket()?;
        let result = self.api.me(&ticket.token).await;
        let identity = self.settle(ticket.generation, result)?;

        let mut inner = self.inner.write();
        if inner.generation != ticket.generation {
            return Err(Error::Superseded);
        }
        inner.state = SessionState::Authenticated(identity.clone());
        Ok(identity)
    }

    // ── Request plumbing ───────────────────────────────────────────────────

    /// Credential and identity for an authenticated request.
    pub fn ticket(&self) -> Result<Ticket> {
        let inner = self.inner.read();
        match (&inner.state, &inner.token) {
            (SessionState::Authenticated(identity), Some(token)) => Ok(Ticket {
                token: token.clone(),
                identity: identity.clone(),
                generation: inner.generation,
            }),
            (SessionState::Unresolved, _) => Err(Error::Auth(
                "Your session is still being restored. Please try again.".into(),
            )),
            _ => Err(Error::not_signed_in()),
        }
    }

    /// Like [`Session::ticket`], but an anonymous session yields `None`
    /// instead of an error.
    pub fn optional_ticket(&self) -> Result<Option<Ticket>> {
        match self.ticket() {
            Ok(ticket) => Ok(Some(ticket)),
            Err(_) if self.inner.read().state == SessionState::Anonymous => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Route the outcome of a request issued under `generation` back into the
    /// session.
    ///
    /// A rejected credential logs the session out, but only if it is still
    /// the session that issued the request. A success that arrives after the
    /// identity changed is discarded.
    pub fn settle<T>(&self, generation: Generation, result: Result<T>) -> Result<T> {
        match result {
            Err(Error::SessionExpired) => {
                self.expire(generation);
                Err(Error::SessionExpired)
            }
            Ok(_) if self.generation() != generation => {
                tracing::debug!("Discarding response from a previous session");
                Err(Error::Superseded)
            }
            other => other,
        }
    }

    /// Sign out because the server rejected the credential of `generation`.
    /// Checked and applied under one write lock, so a newer session is never
    /// signed out by a stale rejection.
    fn expire(&self, generation: Generation) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        tracing::info!("Credential rejected by server; signing out");
        self.sign_out(&mut inner);
        true
    }

    fn sign_out(&self, inner: &mut Inner) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Could not remove stored credential: {:#}", e);
        }
        if inner.state != SessionState::Anonymous {
            inner.state = SessionState::Anonymous;
            inner.token = None;
            inner.generation = next(inner.generation);
            tracing::info!("Signed out");
        }
    }

    fn resolve(&self, generation: Generation, outcome: Option<(Identity, String)>) {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return;
        }
        match outcome {
            Some((identity, token)) => {
                inner.state = SessionState::Authenticated(identity);
                inner.token = Some(token);
            }
            None => {
                inner.state = SessionState::Anonymous;
                inner.token = None;
            }
        }
        inner.generation = next(inner.generation);
    }

    fn discard_credential(&self, generation: Generation) {
        let inner = self.inner.read();
        if inner.generation != generation {
            return;
        }
        if let Err(e) = self.store.clear() {
            tracing::warn!("Could not remove stored credential: {:#}", e);
        }
    }
}

fn next(generation: Generation) -> Generation {
    Generation(generation.0 + 1)
}

#[derive(Deserialize)]
struct AdvisoryClaims {
    exp: Option<i64>,
}

/// Whether the token is a JWT whose own `exp` claim has already passed.
///
/// This never grants anything: a token that is not expired here is still
/// checked by the server, and a token that cannot be decoded is treated as
/// opaque and left for the server to judge.
fn advisory_expired(token: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    match jsonwebtoken::decode::<AdvisoryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
    {
        Ok(data) => data
            .claims
            .exp
            .is_some_and(|exp| exp <= Utc::now().timestamp()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::MemoryCredentialStore;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    fn token_with_exp(exp: i64) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "1", "user_id": 1, "exp": exp }),
            &EncodingKey::from_secret(b"whatever"),
        )
        .unwrap()
    }

    fn offline_session(store: Arc<MemoryCredentialStore>) -> Session {
        // Nothing listens here; any request fails as a service error.
        Session::new(Api::new("http://127.0.0.1:9/api"), store)
    }

    fn identity() -> Identity {
        Identity {
            id: 1,
            email: "a@x.com".into(),
            role: crate::models::Role::User,
        }
    }

    #[test]
    fn advisory_expiry_only_judges_decodable_tokens() {
        let now = Utc::now().timestamp();
        assert!(advisory_expired(&token_with_exp(now - 10)));
        assert!(!advisory_expired(&token_with_exp(now + 3600)));
        assert!(!advisory_expired("opaque-token"));
    }

    #[tokio::test]
    async fn initialize_without_credential_is_anonymous() {
        let session = offline_session(Arc::new(MemoryCredentialStore::new()));
        assert_eq!(session.state(), SessionState::Unresolved);

        assert_eq!(session.initialize().await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn initialize_discards_expired_credential_without_network() {
        let store = Arc::new(MemoryCredentialStore::with_token(token_with_exp(1)));
        let session = offline_session(store.clone());

        assert_eq!(session.initialize().await, SessionState::Anonymous);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn initialize_discards_credential_when_server_unreachable() {
        let store = Arc::new(MemoryCredentialStore::with_token("opaque"));
        let session = offline_session(store.clone());

        assert_eq!(session.initialize().await, SessionState::Anonymous);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn failed_login_leaves_state_and_store_untouched() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = offline_session(store.clone());
        session.initialize().await;
        let before = session.generation();

        let err = session.login("a@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, Error::Service(_)));
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.generation(), before);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn login_and_register_validate_locally() {
        let session = offline_session(Arc::new(MemoryCredentialStore::new()));
        assert!(matches!(
            session.login("", "pw").await,
            Err(Error::Auth(_))
        ));
        assert!(matches!(
            session.register("not-an-email", "pw").await,
            Err(Error::Auth(_))
        ));
        assert!(matches!(
            session.register("a@x.com", "").await,
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn tickets_require_a_resolved_identity() {
        let session = offline_session(Arc::new(MemoryCredentialStore::new()));
        assert!(matches!(session.ticket(), Err(Error::Auth(_))));
        assert!(session.optional_ticket().is_err());

        session.logout();
        assert!(matches!(session.ticket(), Err(Error::Auth(_))));
        assert!(session.optional_ticket().unwrap().is_none());
    }

    #[test]
    fn logout_is_idempotent() {
        let store = Arc::new(MemoryCredentialStore::with_token("t"));
        let session = offline_session(store.clone());

        session.logout();
        let after_first = session.generation();
        session.logout();

        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.generation(), after_first);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn settle_logs_out_on_rejection_from_current_generation() {
        let store = Arc::new(MemoryCredentialStore::with_token("t"));
        let session = offline_session(store.clone());
        session.resolve(session.generation(), Some((identity(), "t".into())));
        let generation = session.generation();

        let result: Result<()> = session.settle(generation, Err(Error::SessionExpired));

        assert_eq!(result, Err(Error::SessionExpired));
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn settle_ignores_rejections_from_an_older_generation() {
        let session = offline_session(Arc::new(MemoryCredentialStore::new()));
        let stale = session.generation();
        session.resolve(stale, Some((identity(), "fresh".into())));

        let result: Result<()> = session.settle(stale, Err(Error::SessionExpired));

        assert_eq!(result, Err(Error::SessionExpired));
        assert!(session.state().is_authenticated());
    }

    #[test]
    fn stale_rejection_racing_a_new_sign_in_never_signs_it_out() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = offline_session(store.clone());
        session.resolve(session.generation(), Some((identity(), "old".into())));
        let issued = session.generation();

        let rejecting = {
            let session = session.clone();
            std::thread::spawn(move || {
                for _ in 0..1_000 {
                    let _: Result<()> = session.settle(issued, Err(Error::SessionExpired));
                }
            })
        };
        // A new identity takes over while the old one's rejections arrive.
        {
            let mut inner = session.inner.write();
            store.save("new").unwrap();
            inner.state = SessionState::Authenticated(identity());
            inner.token = Some("new".into());
            inner.generation = next(inner.generation);
        }
        rejecting.join().unwrap();

        // Whichever side ran first, the new session survives.
        assert!(session.state().is_authenticated());
        assert_eq!(store.load().unwrap().as_deref(), Some("new"));
        assert!(!session.expire(issued));
    }

    #[test]
    fn settle_discards_late_successes() {
        let session = offline_session(Arc::new(MemoryCredentialStore::new()));
        session.resolve(session.generation(), Some((identity(), "t".into())));
        let issued = session.generation();

        session.logout();

        assert_eq!(session.settle(issued, Ok(42)), Err(Error::Superseded));
        assert_eq!(session.settle(session.generation(), Ok(42)), Ok(42));
    }
}
