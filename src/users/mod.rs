//! User collection and its CRUD routes.
//!
//! # Routes
//! ```text
//! GET    /users        → list
//! POST   /users        → create   (201, 400 when name/email missing)
//! PUT    /users/{id}   → update   (200, 404 when unknown)
//! DELETE /users/{id}   → remove   (200, 404 when unknown)
//! ```

pub mod handlers;
pub mod model;
pub mod store;

use axum::{
    routing::{get, put},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub use model::{NewUser, User, UserPatch};
pub use store::{StoreError, UserStore};

pub fn setup_users_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
}
