use linkboard::server::{self, config::AppConfig, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent; env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkboard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env()?;
    tracing::info!("Starting linkboard on {}:{}", config.host, config.port);
    tracing::info!("Site URL: {}", config.site_url);
    if let Some(email) = &config.bootstrap_admin_email {
        tracing::info!("Accounts registered as {} start as admin", email);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let state = AppState::init(config).await?;

    server::serve(listener, state).await
}
