use crate::{
    auth::TokenKeys,
    config::AppConfig,
    errors::AppError,
    models::user::User,
    services::{
        email_service::EmailService, promotion_service::PromotionService,
        upload_service::UploadService, user_service::UserService,
    },
    storage::ObjectStore,
};
use axum::http::StatusCode;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handles, built once at startup and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub store: Arc<dyn ObjectStore>,
    pub promotions: PromotionService,
    pub users: UserService,
    pub email: Arc<EmailService>,
    pub tokens: TokenKeys,
}

impl AppState {
    pub fn new(cfg: &AppConfig, db: Arc<SqlitePool>, store: Arc<dyn ObjectStore>, email: EmailService) -> Self {
        let uploads = UploadService::new(store.clone());
        Self {
            promotions: PromotionService::new(db.clone(), uploads),
            users: UserService::new(db.clone()),
            email: Arc::new(email),
            tokens: TokenKeys::new(&cfg.auth),
            store,
            db,
        }
    }

    /// Issue a one-hour setup token for `user` and email them the link.
    pub async fn send_setup_email(&self, user: &User) -> Result<(), AppError> {
        let token = self.tokens.issue_password_setup(user.id).map_err(|e| {
            tracing::error!(user_id = %user.id, "could not issue setup token: {}", e);
            AppError::internal("Failed to send setup email")
        })?;
        let link = self.email.setup_link(&token);
        self.email
            .send_password_setup_email(&user.email, &link)
            .await
            .map_err(|_| AppError::new(StatusCode::BAD_GATEWAY, "Failed to send setup email"))
    }
}
