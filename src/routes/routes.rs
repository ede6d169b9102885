//! Defines routes for the sales-PDF API.
//!
//! ## Structure
//! - **Promotions** (`/api/non-product-pages`)
//!   - `GET`    - list records, newest first
//!   - `POST`   - multipart upload + create
//!   - `DELETE` - delete by `?id=`
//!
//! - **Users** (admin bearer token required)
//!   - `POST   /api/users`                  - create + send setup email
//!   - `PUT    /api/users/{id}`             - sparse update
//!   - `DELETE /api/users/{id}`             - delete (protected account refused)
//!   - `POST   /api/users/{id}/setup-email` - resend setup email
//!
//! - **Auth**
//!   - `POST /api/auth/login`
//!   - `POST /api/auth/set-password`
//!
//! - `GET /files/{*key}` serves objects for the local storage backend; the
//!   wildcard allows nested keys like `promotions/1700000000000-<uuid>-flyer.pdf`.

use crate::{
    handlers::{
        auth_handlers::{login, set_password},
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        promotion_handlers::{create_promotion, delete_promotion, list_promotions},
        user_handlers::{create_user, delete_user, resend_setup_email, update_user},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

/// Build the router with `AppState` applied.
///
/// `max_body_bytes` caps every request body, multipart uploads included.
pub fn routes(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/non-product-pages",
            get(list_promotions)
                .post(create_promotion)
                .delete(delete_promotion),
        )
        .route("/api/users", post(create_user))
        .route("/api/users/{id}", put(update_user).delete(delete_user))
        .route("/api/users/{id}/setup-email", post(resend_setup_email))
        .route("/api/auth/login", post(login))
        .route("/api/auth/set-password", post(set_password))
        .route("/files/{*key}", get(get_file))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
