use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;

use auth::TokenIssuer;
use cache::LinkCache;
use config::AppConfig;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: AppConfig,
    pub cache: LinkCache,
    pub tokens: TokenIssuer,
}

impl AppState {
    /// Open the database, apply migrations and warm the redirect cache.
    pub async fn init(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let db = db::connect(&config.database_url).await?;

        let cache = LinkCache::new();
        db::warm_cache(&db, &cache).await?;

        let tokens = TokenIssuer::new(&config.jwt_secret, config.token_lifetime_secs);

        Ok(Arc::new(Self {
            db,
            config,
            cache,
            tokens,
        }))
    }
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/shorten",
            get(handlers::links::list_links).post(handlers::links::create_link),
        )
        .route("/shorten/:id", delete(handlers::links::delete_link))
        .route("/stats/:short_code", get(handlers::stats::link_stats))
        .route("/users", get(handlers::users::list_users))
        .route("/users/:id/role", put(handlers::users::set_role))
        .route("/admin/stats", get(handlers::stats::platform_stats));

    Router::new()
        // Health check: returns 200 OK with no auth required
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .nest("/api", api)
        // Short-link redirect: must come LAST so /api/* takes priority
        .route("/:code", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // The API is called from a browser front end on another origin.
                .layer(CorsLayer::permissive()),
        )
}

/// Serve the API on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
