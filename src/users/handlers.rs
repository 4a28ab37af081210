use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::request::{json_or_default, parse_id};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::users::model::{NewUser, User, UserPatch};
use crate::users::store::StoreError;

#[derive(Serialize)]
pub struct Deleted {
    pub success: bool,
}

pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.users.list())
}

pub async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let input: NewUser = json_or_default(&body)?;

    match state.users.create(input.clone()) {
        Ok(user) => {
            tracing::info!(id = user.id, name = %user.name, email = %user.email, "user_created");
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(e) => {
            tracing::warn!(
                name = ?input.name,
                email = ?input.email,
                "user_create_invalid"
            );
            Err(e.into())
        }
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id).inspect_err(|_| {
        tracing::warn!(id = %id, "user_not_found");
    })?;
    let patch: UserPatch = json_or_default(&body)?;

    let user = state.users.update(id, patch).map_err(log_store_error)?;
    tracing::info!(id = user.id, name = %user.name, email = %user.email, "user_updated");
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let id = parse_id(&id).inspect_err(|_| {
        tracing::warn!(id = %id, "user_not_found");
    })?;

    let removed = state.users.remove(id).map_err(log_store_error)?;
    tracing::info!(id = removed.id, name = %removed.name, email = %removed.email, "user_deleted");
    Ok(Json(Deleted { success: true }))
}

fn log_store_error(err: StoreError) -> ApiError {
    if let StoreError::NotFound(id) = err {
        tracing::warn!(id, "user_not_found");
    }
    err.into()
}
