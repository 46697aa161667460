pub mod client;
pub mod error;
pub mod models;
pub mod server;

pub use error::{Error, Result};
