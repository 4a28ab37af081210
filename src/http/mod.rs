//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → middleware/ (trace → request id → access log → metrics → cors → recovery)
//!     → users/, system/ handlers
//!     → request.rs (body decoding, path ids)
//!     → response.rs (error → status + JSON body)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{AppState, HttpServer};
