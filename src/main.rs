use anyhow::{Context, Result, bail};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod storage;
#[cfg(test)]
mod test_utils;

use config::RunMode;
use models::user::Role;
use services::{email_service::EmailService, user_service::UserError};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Environment file (optional) ---
    dotenvy::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting sales-pdf-api with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);

    // --- Handle migration mode ---
    if mode == RunMode::Migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let store = storage::from_config(&cfg.storage).await?;
    let email = EmailService::new(&cfg.email).context("initialising email transport")?;
    tracing::info!("Sending email as {}", email.from_address());
    let state = AppState::new(&cfg, db, store, email);

    if let RunMode::BootstrapAdmin(email) = &mode {
        return bootstrap_admin(&state, email).await;
    }

    // --- Build router ---
    let app = routes::routes(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the first ADMIN account (or reuse a passwordless one) and email
/// it a setup link.
async fn bootstrap_admin(state: &AppState, email: &str) -> Result<()> {
    let email = email.trim();
    if email.parse::<lettre::Address>().is_err() {
        bail!("`{}` is not a valid email address", email);
    }
    db::run_migrations(&state.db).await?;

    let user = match state.users.create(email, Role::Admin).await {
        Ok(user) => user,
        Err(UserError::Conflict(_)) => {
            let existing = state
                .users
                .find_by_email(email)
                .await?
                .with_context(|| format!("user {} vanished during bootstrap", email))?;
            if existing.password.is_some() {
                bail!("{} already exists and has a password", email);
            }
            if !existing.is_admin() {
                bail!("{} already exists without the ADMIN role", email);
            }
            tracing::info!(user_id = %existing.id, "admin exists without password; resending setup email");
            existing
        }
        Err(e) => return Err(e.into()),
    };

    state
        .send_setup_email(&user)
        .await
        .context("sending setup email")?;
    tracing::info!(user_id = %user.id, email = %user.email, "bootstrap admin ready; setup email sent");
    Ok(())
}
