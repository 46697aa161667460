use std::sync::Arc;

pub mod admin;
pub mod analytics;
pub mod api;
pub mod config;
pub mod links;
pub mod policy;
pub mod session;
pub mod store;

pub use admin::RoleAdmin;
pub use analytics::Analytics;
pub use api::Api;
pub use config::ClientConfig;
pub use links::LinkRegistry;
pub use policy::{Decision, Requirement, Route};
pub use session::{Session, SessionState};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

/// All client components wired to one API and one session.
pub struct Client {
    pub session: Session,
    pub links: LinkRegistry,
    pub analytics: Analytics,
    pub admin: RoleAdmin,
    site_url: String,
}

impl Client {
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let api = Api::new(config.api_url.clone());
        Self {
            session: Session::new(api.clone(), store),
            links: LinkRegistry::new(api.clone()),
            analytics: Analytics::new(api.clone()),
            admin: RoleAdmin::new(api),
            site_url: config.site_url.clone(),
        }
    }

    /// Persist the credential at `config.credentials_path`.
    pub fn from_config(config: &ClientConfig) -> Self {
        let store = FileCredentialStore::new(config.credentials_path.clone());
        Self::new(config, Arc::new(store))
    }

    pub fn short_url(&self, short_code: &str) -> String {
        links::short_url(&self.site_url, short_code)
    }
}
