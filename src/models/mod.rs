//! Core data models for the sales PDF service.
//!
//! These entities map cleanly to database tables via `sqlx::FromRow` and
//! serialize as the JSON the web app consumes via `serde`.

pub mod promotion;
pub mod user;
