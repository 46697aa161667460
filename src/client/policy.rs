use super::session::SessionState;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Dashboard,
    Admin,
    NotFound,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
            Route::Admin => "/admin",
            Route::NotFound => "/404",
        }
    }

    pub fn from_path(path: &str) -> Route {
        match path.trim_end_matches('/') {
            "" => Route::Home,
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/dashboard" => Route::Dashboard,
            "/admin" => Route::Admin,
            _ => Route::NotFound,
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Route::Home | Route::NotFound => Requirement::Public,
            Route::Login | Route::Register => Requirement::GuestOnly,
            Route::Dashboard => Requirement::Authenticated,
            Route::Admin => Requirement::Role(Role::Admin),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    /// Sign-in pages; pointless once signed in.
    GuestOnly,
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// The session is still resolving; render nothing gated yet.
    Pending,
    DenyRedirect(Route),
}

/// Where an authenticated user lands when sent away from a view.
pub const DEFAULT_AUTHENTICATED_ROUTE: Route = Route::Dashboard;

pub fn evaluate(state: &SessionState, requirement: Requirement) -> Decision {
    match (requirement, state) {
        (Requirement::Public, _) => Decision::Allow,
        (_, SessionState::Unresolved) => Decision::Pending,

        (Requirement::GuestOnly, SessionState::Anonymous) => Decision::Allow,
        (Requirement::GuestOnly, SessionState::Authenticated(_)) => {
            Decision::DenyRedirect(DEFAULT_AUTHENTICATED_ROUTE)
        }

        (_, SessionState::Anonymous) => Decision::DenyRedirect(Route::Login),

        (Requirement::Authenticated, SessionState::Authenticated(_)) => Decision::Allow,
        (Requirement::Role(role), SessionState::Authenticated(identity)) => {
            if identity.role == role {
                Decision::Allow
            } else {
                Decision::DenyRedirect(DEFAULT_AUTHENTICATED_ROUTE)
            }
        }
    }
}
