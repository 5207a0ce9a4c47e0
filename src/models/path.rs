// src/models/path.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::progress::PathProgress;
use super::category::PathCategory;

pub const DEFAULT_CHARACTER_ICON: &str = "🗡️";
pub const DEFAULT_CHARACTER_DIALOG: &str = "准备好斩题了吗？";

/// Represents the 'learning_paths' table in the database.
/// One curriculum per technology stack.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: String,

    /// Stored lowercase; lookups by stack are case-insensitive.
    pub tech_stack: String,

    pub title: String,

    pub subtitle: Option<String>,

    /// Mascot shown next to the path header.
    pub character_icon: Option<String>,

    pub character_dialog: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Path with its ordered categories, plus the caller's progress when a caller is known.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDetail {
    pub path: LearningPath,
    pub categories: Vec<PathCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<PathProgress>,
}

/// DTO for creating a new learning path.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePathRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub tech_stack: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 500))]
    pub subtitle: Option<String>,
    #[validate(length(max = 32))]
    pub character_icon: Option<String>,
    #[validate(length(max = 500))]
    pub character_dialog: Option<String>,
}

/// DTO for updating a path. Only supplied fields change.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePathRequest {
    #[validate(length(min = 1, max = 64))]
    pub tech_stack: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 500))]
    pub subtitle: Option<String>,
    #[validate(length(max = 32))]
    pub character_icon: Option<String>,
    #[validate(length(max = 500))]
    pub character_dialog: Option<String>,
}

impl UpdatePathRequest {
    pub fn is_empty(&self) -> bool {
        self.tech_stack.is_none()
            && self.title.is_none()
            && self.subtitle.is_none()
            && self.character_icon.is_none()
            && self.character_dialog.is_none()
    }
}
