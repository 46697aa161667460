use anyhow::{Context, Result};

/// Upper bound for `TOKEN_LIFETIME_SECS`: ten years.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./linkboard.db"
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// HMAC secret used to sign bearer tokens
    pub jwt_secret: String,

    /// How many seconds an issued bearer token remains valid
    pub token_lifetime_secs: u64,

    /// Public site URL used when composing short links, e.g. "https://go.example.com".
    /// Never has a trailing slash.
    pub site_url: String,

    /// Length of generated short codes
    pub short_code_length: usize,

    /// Accounts registered with this email start out as administrators.
    pub bootstrap_admin_email: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set in the environment or .env file")?;

        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let token_lifetime_secs =
            parse_token_lifetime(std::env::var("TOKEN_LIFETIME_SECS").ok().as_deref())?;

        let short_code_length = std::env::var("SHORT_CODE_LENGTH")
            .unwrap_or_else(|_| "6".into())
            .parse::<usize>()
            .context("SHORT_CODE_LENGTH must be a positive integer")?;

        if !(4..=16).contains(&short_code_length) {
            anyhow::bail!("SHORT_CODE_LENGTH must be between 4 and 16");
        }

        let site_url = std::env::var("SITE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let bootstrap_admin_email = std::env::var("BOOTSTRAP_ADMIN_EMAIL")
            .ok()
            .map(|e| crate::models::normalize_email(&e))
            .filter(|e| !e.is_empty());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./linkboard.db".into()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            jwt_secret,
            token_lifetime_secs,
            site_url,
            short_code_length,
            bootstrap_admin_email,
        })
    }

    /// Settings for an in-process server bound to a random local port.
    pub fn ephemeral(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: jwt_secret.into(),
            token_lifetime_secs: 3600,
            site_url: "http://localhost".into(),
            short_code_length: 6,
            bootstrap_admin_email: None,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_token_lifetime(raw: Option<&str>) -> Result<u64> {
    let Some(raw) = raw else {
        return Ok(86_400);
    };
    let secs = raw
        .trim()
        .parse::<u64>()
        .context("TOKEN_LIFETIME_SECS must be a positive integer")?;
    if secs == 0 || secs > MAX_TOKEN_LIFETIME_SECS {
        anyhow::bail!("TOKEN_LIFETIME_SECS must be between 1 and {MAX_TOKEN_LIFETIME_SECS}");
    }
    Ok(secs)
}
