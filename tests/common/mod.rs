//! Shared fixtures: a real API server on an ephemeral port over an in-memory
//! database, and clients pointed at it.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use linkboard::{
    client::{Client, ClientConfig, MemoryCredentialStore},
    server::{self, config::AppConfig, db, AppState},
};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@x.com";
pub const PASSWORD: &str = "pw";

pub struct TestServer {
    pub api_url: String,
    pub site_url: String,
    pub state: Arc<AppState>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::ephemeral("integration-test-secret");
        config.bootstrap_admin_email = Some(ADMIN_EMAIL.into());
        configure(&mut config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::init(config).await.unwrap();

        tokio::spawn(server::serve(listener, state.clone()));

        Self {
            api_url: format!("http://{addr}/api"),
            site_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_url, &self.site_url)
    }

    /// A client with an empty in-memory credential store, already resolved
    /// to anonymous.
    pub async fn anonymous_client(&self) -> Client {
        let client = Client::new(&self.config(), Arc::new(MemoryCredentialStore::new()));
        client.session.initialize().await;
        client
    }

    /// Register `email` and sign in as it.
    pub async fn signed_in(&self, email: &str) -> Client {
        let client = self.anonymous_client().await;
        client.session.register(email, PASSWORD).await.unwrap();
        client.session.login(email, PASSWORD).await.unwrap();
        client
    }

    pub async fn admin(&self) -> Client {
        self.signed_in(ADMIN_EMAIL).await
    }

    /// Follow a short link like a browser would, without chasing the redirect.
    pub async fn follow(&self, short_code: &str, user_agent: &str) -> reqwest::StatusCode {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        http.get(format!("{}/{}", self.site_url, short_code))
            .header("user-agent", user_agent)
            .header("x-forwarded-for", "203.0.113.7")
            .send()
            .await
            .unwrap()
            .status()
    }

    /// Click recording happens in the background; wait until `expected`
    /// clicks are stored for the link.
    pub async fn wait_for_clicks(&self, link_id: Uuid, expected: i64) {
        for _ in 0..100 {
            if db::count_clicks(&self.state.db, link_id).await.unwrap() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("link {link_id} never reached {expected} clicks");
    }

    /// Remove an account behind the client's back.
    pub async fn delete_user(&self, id: i64) {
        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.state.db)
            .await
            .unwrap();
    }
}
