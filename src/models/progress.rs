// src/models/progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::path::LearningPath;

/// Lock state of a node for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NodeStatus {
    Locked,
    Unlocked,
    Completed,
}

/// Represents the 'user_node_progress' table in the database.
/// Exactly one row per (user_id, node_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserNodeProgress {
    pub id: i64,

    /// Opaque caller identity (a device id in practice).
    pub user_id: String,

    pub node_id: String,
    pub status: NodeStatus,
    pub correct_count: i64,
    pub total_count: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserNodeProgress {
    pub fn is_completed(&self) -> bool {
        self.status == NodeStatus::Completed
    }
}

/// Aggregated completion of one path for one user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathProgress {
    pub total_nodes: i64,
    pub completed_nodes: i64,
    pub completion_rate: f64,
}

impl PathProgress {
    pub fn from_counts(total_nodes: i64, completed_nodes: i64) -> Self {
        let completion_rate = if total_nodes > 0 {
            completed_nodes as f64 / total_nodes as f64
        } else {
            0.0
        };
        Self {
            total_nodes,
            completed_nodes,
            completion_rate,
        }
    }
}

/// Path summary with the caller's aggregate progress.
#[derive(Debug, Serialize)]
pub struct UserPathProgress {
    pub path: LearningPath,
    pub progress: PathProgress,
}
