//! Application users and their roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// The one account nobody may delete.
pub const PROTECTED_EMAIL: &str = "admin@gulbahartobacco.com";

#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,

    /// Argon2 PHC string; `None` until the user completes password setup.
    #[serde(skip_serializing, default)]
    pub password: Option<String>,

    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this is the protected account (ASCII case and surrounding
    /// whitespace are ignored).
    pub fn is_protected(&self) -> bool {
        self.email.trim().eq_ignore_ascii_case(PROTECTED_EMAIL)
    }
}

/// Sparse set of changes to apply to a user. `None` means "leave as is".
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    /// Already hashed.
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password_hash.is_none() && self.role.is_none()
    }
}
