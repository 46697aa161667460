//! Session lifecycle against a live API server.

mod common;

use std::sync::Arc;

use common::{TestServer, PASSWORD};
use linkboard::{
    client::{
        Client, CredentialStore, Decision, FileCredentialStore, MemoryCredentialStore, Route,
        SessionState,
    },
    models::Role,
    Error,
};
use tempfile::TempDir;

#[tokio::test]
async fn register_does_not_sign_in() {
    let server = TestServer::start().await;
    let client = server.anonymous_client().await;

    client.session.register("a@x.com", PASSWORD).await.unwrap();

    assert_eq!(client.session.state(), SessionState::Anonymous);
    assert_eq!(
        client.session.authorize(Route::Dashboard),
        Decision::DenyRedirect(Route::Login)
    );
}

#[tokio::test]
async fn login_resolves_identity_and_persists_credential() {
    let server = TestServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let client = Client::new(&server.config(), store.clone());
    client.session.initialize().await;
    client.session.register("a@x.com", PASSWORD).await.unwrap();

    let identity = client.session.login("a@x.com", PASSWORD).await.unwrap();

    assert_eq!(identity.email, "a@x.com");
    assert_eq!(identity.role, Role::User);
    assert_eq!(client.session.identity(), Some(identity));
    assert!(store.load().unwrap().is_some());
    assert_eq!(client.session.authorize(Route::Dashboard), Decision::Allow);
    assert_eq!(
        client.session.authorize(Route::Admin),
        Decision::DenyRedirect(Route::Dashboard)
    );
}

#[tokio::test]
async fn duplicate_registration_is_an_auth_error() {
    let server = TestServer::start().await;
    let client = server.anonymous_client().await;
    client.session.register("a@x.com", PASSWORD).await.unwrap();

    let err = client.session.register("a@x.com", "other").await.unwrap_err();

    assert!(matches!(err, Error::Auth(ref msg) if msg.contains("already exists")));
}

#[tokio::test]
async fn emails_are_case_insensitive() {
    let server = TestServer::start().await;
    let client = server.anonymous_client().await;
    client.session.register("a@x.com", PASSWORD).await.unwrap();

    let err = client.session.register("A@X.COM", PASSWORD).await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref msg) if msg.contains("already exists")));

    let identity = client.session.login("A@X.Com", PASSWORD).await.unwrap();
    assert_eq!(identity.email, "a@x.com");
    assert_eq!(identity.role, Role::User);
}

#[tokio::test]
async fn wrong_password_leaves_session_anonymous() {
    let server = TestServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let client = Client::new(&server.config(), store.clone());
    client.session.initialize().await;
    client.session.register("a@x.com", PASSWORD).await.unwrap();

    let err = client.session.login("a@x.com", "wrong").await.unwrap_err();

    assert_eq!(err, Error::Auth("Invalid credentials".into()));
    assert_eq!(client.session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn logout_clears_credential_and_blocks_authenticated_calls() {
    let server = TestServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let mut client = Client::new(&server.config(), store.clone());
    client.session.initialize().await;
    client.session.register("a@x.com", PASSWORD).await.unwrap();
    client.session.login("a@x.com", PASSWORD).await.unwrap();

    client.session.logout();
    client.session.logout();

    assert_eq!(client.session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
    assert!(matches!(
        client.links.list(&client.session).await,
        Err(Error::Auth(_))
    ));
    assert!(matches!(
        client.analytics.get_stats(&client.session, "abc123").await,
        Err(Error::Auth(_))
    ));
    assert_eq!(
        client.session.authorize(Route::Dashboard),
        Decision::DenyRedirect(Route::Login)
    );
}

#[tokio::test]
async fn session_survives_a_restart_through_the_file_store() {
    let server = TestServer::start().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");

    let first = Client::new(&server.config(), Arc::new(FileCredentialStore::new(&path)));
    first.session.initialize().await;
    first.session.register("a@x.com", PASSWORD).await.unwrap();
    let identity = first.session.login("a@x.com", PASSWORD).await.unwrap();
    drop(first);

    let second = Client::new(&server.config(), Arc::new(FileCredentialStore::new(&path)));
    assert_eq!(second.session.authorize(Route::Dashboard), Decision::Pending);

    let state = second.session.initialize().await;

    assert_eq!(state, SessionState::Authenticated(identity));
    assert_eq!(second.session.authorize(Route::Dashboard), Decision::Allow);
}

#[tokio::test]
async fn rejected_stored_credential_is_discarded_on_startup() {
    let server = TestServer::start().await;
    let store = Arc::new(MemoryCredentialStore::with_token("not-a-real-token"));
    let client = Client::new(&server.config(), store.clone());

    assert_eq!(client.session.initialize().await, SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn server_rejection_expires_the_session() {
    let server = TestServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let mut client = Client::new(&server.config(), store.clone());
    client.session.initialize().await;
    client.session.register("a@x.com", PASSWORD).await.unwrap();
    let identity = client.session.login("a@x.com", PASSWORD).await.unwrap();

    server.delete_user(identity.id).await;

    let err = client.links.list(&client.session).await.unwrap_err();
    assert_eq!(err, Error::SessionExpired);
    assert_eq!(client.session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);

    // Anything further needs a fresh sign-in.
    assert!(matches!(
        client.links.list(&client.session).await,
        Err(Error::Auth(_))
    ));
}

#[tokio::test]
async fn tokens_from_another_deployment_are_rejected() {
    let ours = TestServer::start().await;
    let theirs = TestServer::start_with(|c| c.jwt_secret = "a-different-secret".into()).await;

    let foreign = theirs.signed_in("a@x.com").await;
    let token = foreign.session.ticket().unwrap().token;

    let store = Arc::new(MemoryCredentialStore::with_token(token));
    let client = Client::new(&ours.config(), store.clone());

    assert_eq!(client.session.initialize().await, SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn refresh_picks_up_a_role_change() {
    let server = TestServer::start().await;
    let admin = server.admin().await;
    let user = server.signed_in("b@x.com").await;
    let user_id = user.session.identity().unwrap().id;

    admin
        .admin
        .set_role(&admin.session, user_id, "admin")
        .await
        .unwrap();
    assert_eq!(
        user.session.authorize(Route::Admin),
        Decision::DenyRedirect(Route::Dashboard)
    );

    let refreshed = user.session.refresh().await.unwrap();

    assert_eq!(refreshed.role, Role::Admin);
    assert_eq!(user.session.authorize(Route::Admin), Decision::Allow);
}
