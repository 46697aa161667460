pub mod auth;
pub mod links;
pub mod redirect;
pub mod stats;
pub mod users;
