//! Admin-only user management under `/api/users`.

use crate::{
    auth::{AdminUser, password::hash_password},
    errors::AppError,
    models::user::{Role, User, UserPatch},
    services::user_service::UserError,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse::<Role>()
        .map_err(|_| AppError::bad_request("Invalid role"))
}

/// `POST /api/users`: create a passwordless user and email a setup link.
pub async fn create_user(
    AdminUser(caller): AdminUser,
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|_| AppError::bad_request("Invalid request body"))?;

    let email = req.email.trim();
    if email.parse::<lettre::Address>().is_err() {
        return Err(AppError::bad_request("Invalid email"));
    }
    let role = match non_empty(req.role) {
        Some(raw) => parse_role(&raw)?,
        None => Role::User,
    };

    let user = state.users.create(email, role).await.map_err(|e| match e {
        UserError::Conflict(_) => AppError::conflict("User already exists"),
        other => {
            tracing::error!("Error creating user: {}", other);
            AppError::internal("Failed to create user")
        }
    })?;
    tracing::info!(admin_id = %caller.id, user_id = %user.id, "admin created user");

    state.send_setup_email(&user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `PUT /api/users/{id}`: sparse update of email, password and role.
pub async fn update_user(
    AdminUser(caller): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(req) = body.map_err(|_| AppError::bad_request("Invalid request body"))?;

    let email = non_empty(req.email).map(|e| e.trim().to_string());
    let password = non_empty(req.password);
    let role = non_empty(req.role);
    if email.is_none() && password.is_none() && role.is_none() {
        return Err(AppError::bad_request("At least one field is required for update"));
    }

    let role = role.as_deref().map(parse_role).transpose()?;
    let password_hash = password
        .map(|p| hash_password(&p))
        .transpose()
        .map_err(|e| {
            tracing::error!("Error updating user: {}", e);
            AppError::internal("Failed to update user")
        })?;
    let patch = UserPatch {
        email,
        password_hash,
        role,
    };

    let id = Uuid::parse_str(&id).map_err(|_| {
        tracing::error!(id = %id, "Error updating user: malformed id");
        AppError::internal("Failed to update user")
    })?;

    let updated = state.users.update(id, &patch).await.map_err(|e| {
        tracing::error!(user_id = %id, "Error updating user: {}", e);
        AppError::internal("Failed to update user")
    })?;
    tracing::info!(admin_id = %caller.id, user_id = %id, "admin updated user");
    Ok(Json(updated))
}

/// `DELETE /api/users/{id}`
pub async fn delete_user(
    AdminUser(caller): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::not_found("User not found"))?;

    state.users.delete(id).await.map_err(|e| match e {
        UserError::NotFound(_) => AppError::not_found("User not found"),
        UserError::Protected(_) => AppError::forbidden("This user account cannot be deleted."),
        other => {
            tracing::error!(user_id = %id, "Error deleting user: {}", other);
            AppError::internal("Failed to delete user")
        }
    })?;

    tracing::info!(admin_id = %caller.id, user_id = %id, "admin deleted user");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

/// `POST /api/users/{id}/setup-email`: send a fresh setup link.
pub async fn resend_setup_email(
    AdminUser(_caller): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::not_found("User not found"))?;
    let user = state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %id, "user lookup failed: {}", e);
            AppError::internal("Failed to send setup email")
        })?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    state.send_setup_email(&user).await?;
    Ok(Json(json!({ "message": "Setup email sent" })))
}
