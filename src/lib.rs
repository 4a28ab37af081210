//! User service library: a small JSON user API with built-in observability.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod system;
pub mod users;

pub use config::schema::ServiceConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
