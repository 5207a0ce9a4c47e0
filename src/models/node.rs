// src/models/node.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use super::progress::{NodeStatus, UserNodeProgress};

pub const DEFAULT_NODE_COLOR: &str = "primary";
pub const DEFAULT_ESTIMATED_MINUTES: i64 = 10;

/// Represents the 'path_nodes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathNode {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub icon: Option<String>,
    pub color: Option<String>,

    /// Traversal order within the category. Not unique.
    pub sort_order: i64,

    /// Ordered question set for this node.
    /// Stored as a JSON array in the database.
    pub question_ids: Json<Vec<String>>,

    pub estimated_minutes: i64,

    pub created_at: DateTime<Utc>,

    /// Loaded from 'node_prerequisites', not a column of 'path_nodes'.
    #[sqlx(skip)]
    pub prerequisite_node_ids: Vec<String>,
}

/// A node as seen by one caller. Status fields are omitted for anonymous browsing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    #[serde(flatten)]
    pub node: PathNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
}

impl NodeView {
    pub fn anonymous(node: PathNode) -> Self {
        Self {
            node,
            status: None,
            correct_count: None,
            total_count: None,
        }
    }

    pub fn with_status(node: PathNode, status: NodeStatus, record: Option<&UserNodeProgress>) -> Self {
        Self {
            node,
            status: Some(status),
            correct_count: record.map(|p| p.correct_count),
            total_count: record.map(|p| p.total_count),
        }
    }
}

/// Result of completing a node.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCompletion {
    pub node: PathNode,
    pub progress: UserNodeProgress,
    pub next_node: Option<PathNode>,
    /// Whether the next node is open to the caller under the configured unlock policy.
    pub unlocked_next: bool,
}

/// DTO for reporting answer performance on a node.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteNodeRequest {
    #[validate(range(min = 0))]
    pub correct_count: i64,
    #[validate(range(min = 0))]
    pub total_count: i64,
}

/// DTO for creating a new node.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub category_id: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 32))]
    pub icon: Option<String>,
    #[validate(length(max = 32))]
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub question_ids: Vec<String>,
    #[serde(default)]
    pub prerequisite_node_ids: Vec<String>,
    #[validate(range(min = 0, max = 600))]
    pub estimated_minutes: Option<i64>,
}

/// DTO for updating a node. Fields are optional.
/// A supplied `prerequisiteNodeIds` replaces the whole prerequisite set.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 32))]
    pub icon: Option<String>,
    #[validate(length(max = 32))]
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    pub question_ids: Option<Vec<String>>,
    pub prerequisite_node_ids: Option<Vec<String>>,
    #[validate(range(min = 0, max = 600))]
    pub estimated_minutes: Option<i64>,
}

impl UpdateNodeRequest {
    /// True when no column of 'path_nodes' itself changes.
    pub fn has_no_column_changes(&self) -> bool {
        self.title.is_none()
            && self.icon.is_none()
            && self.color.is_none()
            && self.sort_order.is_none()
            && self.question_ids.is_none()
            && self.estimated_minutes.is_none()
    }
}
