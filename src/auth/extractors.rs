use super::token::TokenPurpose;
use crate::{errors::AppError, models::user::User, state::AppState};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// The authenticated caller, guaranteed to hold the ADMIN role.
///
/// Rejects with 401 when the bearer token is missing or invalid, and with
/// 403 when the token's user no longer exists or is not an admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(AppError::unauthorized)?;
        let user_id = state
            .tokens
            .verify(token, TokenPurpose::Session)
            .map_err(|_| AppError::unauthorized())?;

        let caller = state.users.find_by_id(user_id).await.map_err(|e| {
            tracing::error!(user_id = %user_id, "caller lookup failed: {}", e);
            AppError::forbidden("Forbidden")
        })?;

        match caller {
            Some(user) if user.is_admin() => {
                tracing::debug!(user_id = %user.id, "authenticated admin");
                Ok(AdminUser(user))
            }
            _ => Err(AppError::forbidden("Forbidden")),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
