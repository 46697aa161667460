use std::path::PathBuf;

use super::store::FileCredentialStore;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address of the JSON API, e.g. "http://localhost:3000/api"
    pub api_url: String,

    /// Public site address used to compose `{site}/{short_code}`. Never
    /// requested by the client itself.
    pub site_url: String,

    /// Where the bearer credential is persisted between runs
    pub credentials_path: PathBuf,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, site_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_owned(),
            site_url: site_url.into().trim_end_matches('/').to_owned(),
            credentials_path: FileCredentialStore::default_path(),
        }
    }

    /// Load from `API_URL`, `SITE_URL` and `LINKBOARD_CREDENTIALS`, with
    /// local-development defaults.
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000/api".into());
        let site_url = std::env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let mut config = Self::new(api_url, site_url);
        if let Ok(path) = std::env::var("LINKBOARD_CREDENTIALS") {
            config.credentials_path = PathBuf::from(path);
        }
        config
    }
}
