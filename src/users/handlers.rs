use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::{
    error::AppError,
    state::AppState,
    users::{
        dto::UserPayload,
        password::hash_password,
        repo::DuplicateUser,
        repo_types::User,
        validation::{validate_user, validate_user_changes},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route(
            "/users/:id",
            get(find_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<User>), AppError> {
    let payload = UserPayload::from(body_value(body)?);
    let new_user = validate_user(&payload, state.clock.now()).map_err(|e| {
        warn!(error = %e, "user payload rejected");
        e
    })?;

    match state.users.find_by_email(&new_user.email).await {
        Ok(Some(_)) => {
            warn!(email = %new_user.email, "email already registered");
            return Err(DuplicateUser::Email.into());
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(AppError::Internal("Failed to create user"));
        }
    }

    let hash = hash_password(&new_user.hashed_password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::Internal("Failed to create user")
    })?;

    let user = state
        .users
        .create(&new_user, &hash)
        .await
        .map_err(|e| storage_error(e, "create user", "Failed to create user"))?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/users/{}", user.id)) {
        headers.insert(header::LOCATION, location);
    }

    info!(user_id = user.id, username = %user.username, "user created");
    Ok((StatusCode::CREATED, headers, Json(user)))
}

#[instrument(skip(state))]
pub async fn find_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let id = parse_id(&id)?;
    match state.users.find_by_id(id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(AppError::NotFound("User not found")),
        Err(e) => {
            error!(error = %e, user_id = id, "find_by_id failed");
            Err(AppError::Internal("Failed to retrieve user"))
        }
    }
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let id = parse_id(&id)?;
    let payload = UserPayload::from(body_value(body)?);
    let changes = validate_user_changes(&payload, state.clock.now()).map_err(|e| {
        warn!(error = %e, user_id = id, "user update rejected");
        e
    })?;

    let hash = match changes.hashed_password.as_deref() {
        Some(plain) => Some(hash_password(plain).map_err(|e| {
            error!(error = %e, "hash_password failed");
            AppError::Internal("Failed to update user information")
        })?),
        None => None,
    };

    match state.users.update(id, &changes, hash.as_deref()).await {
        Ok(Some(user)) => {
            info!(user_id = user.id, "user updated");
            Ok(Json(user))
        }
        Ok(None) => Err(AppError::NotFound("User not found")),
        Err(e) => Err(storage_error(
            e,
            "update user",
            "Failed to update user information",
        )),
    }
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    match state.users.delete(id).await {
        Ok(true) => {
            info!(user_id = id, "user deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(AppError::NotFound("User not found")),
        Err(e) => {
            error!(error = %e, user_id = id, "delete user failed");
            Err(AppError::Internal("Failed to delete user"))
        }
    }
}

/// A body sent without a JSON content type reads as an empty payload, so the
/// validator reports the first missing field.
fn body_value(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Value::Null),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "request body rejected");
            Err(AppError::BadRequest("Request body must be valid JSON"))
        }
    }
}

/// Unique-column clashes become 409; anything else is logged and hidden.
fn storage_error(e: anyhow::Error, op: &str, message: &'static str) -> AppError {
    match e.downcast_ref::<DuplicateUser>() {
        Some(duplicate) => {
            warn!(error = %duplicate, "{op} conflict");
            AppError::from(*duplicate)
        }
        None => {
            error!(error = %e, "{op} failed");
            AppError::Internal(message)
        }
    }
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest("Invalid user id"))
}
