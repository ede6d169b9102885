//! Login and password setup.

use crate::{
    auth::{
        TokenPurpose,
        password::{MIN_PASSWORD_LEN, hash_password, verify_password},
    },
    errors::AppError,
    models::user::User,
    services::user_service::UserError,
    state::AppState,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(req) = body.map_err(|_| AppError::bad_request("Invalid request body"))?;
    let invalid = || AppError::new(axum::http::StatusCode::UNAUTHORIZED, "Invalid email or password");

    let user = state
        .users
        .find_by_email(&req.email)
        .await
        .map_err(|e| {
            tracing::error!("login lookup failed: {}", e);
            AppError::internal("Login failed")
        })?
        .ok_or_else(invalid)?;

    let Some(hash) = user.password.as_deref() else {
        tracing::debug!(user_id = %user.id, "login before password setup");
        return Err(invalid());
    };
    if !verify_password(&req.password, hash) {
        return Err(invalid());
    }

    let token = state.tokens.issue_session(user.id).map_err(|e| {
        tracing::error!("could not issue session token: {}", e);
        AppError::internal("Login failed")
    })?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse { token, user }))
}

/// `POST /api/auth/set-password`: redeem a setup token.
pub async fn set_password(
    State(state): State<AppState>,
    body: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(req) = body.map_err(|_| AppError::bad_request("Invalid request body"))?;
    let expired = || AppError::new(axum::http::StatusCode::UNAUTHORIZED, "Invalid or expired token");

    let user_id = state
        .tokens
        .verify(&req.token, TokenPurpose::PasswordSetup)
        .map_err(|_| expired())?;

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("{}", e);
        AppError::internal("Failed to set password")
    })?;
    state
        .users
        .set_password(user_id, &hash)
        .await
        .map_err(|e| match e {
            UserError::NotFound(_) => expired(),
            other => {
                tracing::error!(user_id = %user_id, "set password failed: {}", other);
                AppError::internal("Failed to set password")
            }
        })?;

    Ok(Json(json!({ "message": "Password set successfully" })))
}
