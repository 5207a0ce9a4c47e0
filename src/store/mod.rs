// src/store/mod.rs

//! Persistence for the path catalog and the per-user progress ledger.
//!
//! Both traits are implemented by [`SqliteStore`], which wraps the shared
//! `SqlitePool`. Cascades (path -> categories -> nodes -> progress rows) are
//! enforced by foreign keys, so the pool must run with `foreign_keys = ON`.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
    error::AppError,
    models::{
        category::{CreateCategoryRequest, PathCategory, UpdateCategoryRequest},
        node::{CreateNodeRequest, PathNode, UpdateNodeRequest},
        path::{CreatePathRequest, LearningPath, UpdatePathRequest},
        progress::{PathProgress, UserNodeProgress},
    },
};

mod catalog;
mod ledger;

/// Static structure: paths, categories, nodes and their prerequisite links.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_paths(&self) -> Result<Vec<LearningPath>, AppError>;
    async fn get_path(&self, id: &str) -> Result<Option<LearningPath>, AppError>;
    /// Case-insensitive.
    async fn get_path_by_tech_stack(&self, tech_stack: &str) -> Result<Option<LearningPath>, AppError>;

    /// Ascending by sort order, ties by insertion order.
    async fn list_categories(&self, path_id: &str) -> Result<Vec<PathCategory>, AppError>;
    async fn get_category(&self, id: &str) -> Result<Option<PathCategory>, AppError>;

    /// Ascending by sort order, ties by insertion order, with prerequisites attached.
    async fn list_nodes(&self, category_id: &str) -> Result<Vec<PathNode>, AppError>;
    async fn get_node(&self, id: &str) -> Result<Option<PathNode>, AppError>;

    /// Every node of the path in traversal order: categories by sort order, then nodes
    /// by sort order, ties by insertion order. Prerequisites attached.
    async fn list_path_nodes(&self, path_id: &str) -> Result<Vec<PathNode>, AppError>;

    /// First node of the first category of the path.
    async fn entry_node(&self, path_id: &str) -> Result<Option<PathNode>, AppError>;

    async fn create_path(&self, input: &CreatePathRequest) -> Result<LearningPath, AppError>;
    async fn update_path(&self, id: &str, input: &UpdatePathRequest) -> Result<Option<LearningPath>, AppError>;
    async fn delete_path(&self, id: &str) -> Result<bool, AppError>;

    async fn create_category(&self, input: &CreateCategoryRequest) -> Result<PathCategory, AppError>;
    async fn update_category(&self, id: &str, input: &UpdateCategoryRequest) -> Result<Option<PathCategory>, AppError>;
    async fn delete_category(&self, id: &str) -> Result<bool, AppError>;

    async fn create_node(&self, input: &CreateNodeRequest) -> Result<PathNode, AppError>;
    async fn update_node(&self, id: &str, input: &UpdateNodeRequest) -> Result<Option<PathNode>, AppError>;
    async fn delete_node(&self, id: &str) -> Result<bool, AppError>;
}

/// Durable per-(user, node) completion state.
#[async_trait]
pub trait ProgressLedger: Send + Sync {
    async fn get_progress(&self, user_id: &str, node_id: &str) -> Result<Option<UserNodeProgress>, AppError>;

    /// One round trip for a whole node set.
    async fn list_progress(&self, user_id: &str, node_ids: &[String]) -> Result<Vec<UserNodeProgress>, AppError>;

    /// Marks the node completed with the given counts, inserting or updating the single row.
    async fn upsert_completion(
        &self,
        user_id: &str,
        node_id: &str,
        correct_count: i64,
        total_count: i64,
    ) -> Result<UserNodeProgress, AppError>;

    /// Inserts an `unlocked` row unless one already exists. Returns whether a row was written.
    async fn insert_unlocked(&self, user_id: &str, node_id: &str) -> Result<bool, AppError>;

    async fn aggregate_path_progress(&self, user_id: &str, path_id: &str) -> Result<PathProgress, AppError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Opens the pool with foreign keys enforced. The database file is created if missing.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
}

/// Applies the embedded schema migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
