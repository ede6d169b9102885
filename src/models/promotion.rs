//! A promotional PDF ("non-product page") and its category.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Closed set of promotion categories.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PromotionType {
    BannerFront,
    BannerBack,
    Advertisement,
    Promotion,
}

impl PromotionType {
    pub const ALL: [PromotionType; 4] = [
        PromotionType::BannerFront,
        PromotionType::BannerBack,
        PromotionType::Advertisement,
        PromotionType::Promotion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionType::BannerFront => "banner_front",
            PromotionType::BannerBack => "banner_back",
            PromotionType::Advertisement => "advertisement",
            PromotionType::Promotion => "promotion",
        }
    }
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a submitted type is outside [`PromotionType::ALL`].
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidPromotionType;

impl FromStr for PromotionType {
    type Err = InvalidPromotionType;

    /// Case-insensitive; surrounding whitespace is not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromotionType::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(s))
            .ok_or(InvalidPromotionType)
    }
}

/// A persisted promotion record. The PDF itself lives in object storage at
/// `file_path`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: Uuid,

    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: PromotionType,

    pub title: String,

    /// Public URL of the stored PDF.
    pub file_path: String,

    pub created_at: DateTime<Utc>,
}
