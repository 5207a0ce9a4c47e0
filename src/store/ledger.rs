// src/store/ledger.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

use super::{ProgressLedger, SqliteStore};
use crate::{
    error::AppError,
    models::progress::{PathProgress, UserNodeProgress},
};

#[async_trait]
impl ProgressLedger for SqliteStore {
    async fn get_progress(&self, user_id: &str, node_id: &str) -> Result<Option<UserNodeProgress>, AppError> {
        let progress = sqlx::query_as::<_, UserNodeProgress>(
            "SELECT * FROM user_node_progress WHERE user_id = ? AND node_id = ?",
        )
        .bind(user_id)
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(progress)
    }

    async fn list_progress(&self, user_id: &str, node_ids: &[String]) -> Result<Vec<UserNodeProgress>, AppError> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT * FROM user_node_progress WHERE user_id = ");
        query_builder.push_bind(user_id);
        query_builder.push(" AND node_id IN (");

        let mut separated = query_builder.separated(",");
        for id in node_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows = query_builder
            .build_query_as::<UserNodeProgress>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn upsert_completion(
        &self,
        user_id: &str,
        node_id: &str,
        correct_count: i64,
        total_count: i64,
    ) -> Result<UserNodeProgress, AppError> {
        let now = Utc::now();

        // Upsert: one row per (user, node); the latest counts always win.
        let progress = sqlx::query_as::<_, UserNodeProgress>(
            r#"
            INSERT INTO user_node_progress
            (user_id, node_id, status, correct_count, total_count, completed_at, created_at)
            VALUES (?, ?, 'completed', ?, ?, ?, ?)
            ON CONFLICT(user_id, node_id) DO UPDATE SET
                status = 'completed',
                correct_count = excluded.correct_count,
                total_count = excluded.total_count,
                completed_at = excluded.completed_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(node_id)
        .bind(correct_count)
        .bind(total_count)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert progress: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(progress)
    }

    async fn insert_unlocked(&self, user_id: &str, node_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_node_progress (user_id, node_id, status, correct_count, total_count, created_at)
            VALUES (?, ?, 'unlocked', 0, 0, ?)
            ON CONFLICT(user_id, node_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(node_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn aggregate_path_progress(&self, user_id: &str, path_id: &str) -> Result<PathProgress, AppError> {
        let total_nodes = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(n.id)
            FROM path_categories c
            JOIN path_nodes n ON n.category_id = c.id
            WHERE c.path_id = ?
            "#,
        )
        .bind(path_id)
        .fetch_one(&self.pool)
        .await?;

        let completed_nodes = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(p.id)
            FROM user_node_progress p
            JOIN path_nodes n ON n.id = p.node_id
            JOIN path_categories c ON c.id = n.category_id
            WHERE p.user_id = ? AND c.path_id = ? AND p.status = 'completed'
            "#,
        )
        .bind(user_id)
        .bind(path_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(PathProgress::from_counts(total_nodes, completed_nodes))
    }
}
