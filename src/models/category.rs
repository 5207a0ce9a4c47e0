// src/models/category.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::node::NodeView;

pub const DEFAULT_CATEGORY_COLOR: &str = "#58CC02";

/// Represents the 'path_categories' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathCategory {
    pub id: String,
    pub path_id: String,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,

    /// Display and traversal order within the path. Not unique.
    pub sort_order: i64,

    pub created_at: DateTime<Utc>,
}

/// A category together with its ordered nodes.
#[derive(Debug, Serialize)]
pub struct CategoryNodes {
    pub category: PathCategory,
    pub nodes: Vec<NodeView>,
}

/// DTO for creating a new category.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub path_id: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 32))]
    pub icon: Option<String>,
    #[validate(length(max = 32))]
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

/// DTO for updating a category. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 32))]
    pub icon: Option<String>,
    #[validate(length(max = 32))]
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

impl UpdateCategoryRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.icon.is_none() && self.color.is_none() && self.sort_order.is_none()
    }
}
