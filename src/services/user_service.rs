//! User persistence: lookup, creation, sparse updates, guarded deletion.

use crate::{
    db::is_unique_violation,
    models::user::{Role, User, UserPatch},
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password, role, created_at, updated_at";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user `{0}` not found")]
    NotFound(Uuid),
    #[error("a user with email `{0}` already exists")]
    Conflict(String),
    #[error("user `{0}` is protected and cannot be deleted")]
    Protected(Uuid),
    #[error("no fields to update")]
    EmptyPatch,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type UserResult<T> = Result<T, UserError>;

#[derive(Clone)]
pub struct UserService {
    db: Arc<SqlitePool>,
}

impl UserService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email.trim())
        .fetch_optional(&*self.db)
        .await?;
        Ok(user)
    }

    /// Insert a user without a password. The password is set later through
    /// the setup flow.
    pub async fn create(&self, email: &str, role: Role) -> UserResult<User> {
        let email = email.trim();
        let now = Utc::now();
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, password, role, created_at, updated_at)
             VALUES (?, ?, NULL, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await;

        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = ?user.role, "user created");
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => Err(UserError::Conflict(email.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply only the fields present in `patch`; everything else is left
    /// untouched.
    pub async fn update(&self, id: Uuid, patch: &UserPatch) -> UserResult<User> {
        if patch.is_empty() {
            return Err(UserError::EmptyPatch);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        let mut fields = qb.separated(", ");
        if let Some(email) = &patch.email {
            fields.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(hash) = &patch.password_hash {
            fields.push("password = ").push_bind_unseparated(hash.clone());
        }
        if let Some(role) = patch.role {
            fields.push("role = ").push_bind_unseparated(role);
        }
        fields.push("updated_at = ").push_bind_unseparated(Utc::now());
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(USER_COLUMNS);

        let result = qb.build_query_as::<User>().fetch_optional(&*self.db).await;
        match result {
            Ok(Some(user)) => {
                tracing::info!(
                    user_id = %id,
                    email = patch.email.is_some(),
                    password = patch.password_hash.is_some(),
                    role = patch.role.is_some(),
                    "user updated"
                );
                Ok(user)
            }
            Ok(None) => Err(UserError::NotFound(id)),
            Err(e) if is_unique_violation(&e) => {
                Err(UserError::Conflict(patch.email.clone().unwrap_or_default()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> UserResult<()> {
        let result = sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id));
        }
        tracing::info!(user_id = %id, "password set");
        Ok(())
    }

    /// Delete a user. The protected account is refused whoever asks.
    pub async fn delete(&self, id: Uuid) -> UserResult<()> {
        let target = self.find_by_id(id).await?.ok_or(UserError::NotFound(id))?;
        if target.is_protected() {
            tracing::warn!(user_id = %id, "refused to delete protected account");
            return Err(UserError::Protected(id));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id));
        }
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}
