// src/store/catalog.rs

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, types::Json};

use super::{CatalogStore, SqliteStore};
use crate::{
    error::AppError,
    models::{
        category::{CreateCategoryRequest, DEFAULT_CATEGORY_COLOR, PathCategory, UpdateCategoryRequest},
        node::{CreateNodeRequest, DEFAULT_ESTIMATED_MINUTES, DEFAULT_NODE_COLOR, PathNode, UpdateNodeRequest},
        path::{
            CreatePathRequest, DEFAULT_CHARACTER_DIALOG, DEFAULT_CHARACTER_ICON, LearningPath,
            UpdatePathRequest,
        },
    },
};

/// Maps a unique-constraint violation to a conflict on the given key.
fn conflict_or_internal(err: sqlx::Error, entity: &'static str, key: &str) -> AppError {
    let is_unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if is_unique {
        AppError::conflict(entity, key)
    } else {
        tracing::error!("Failed to write {}: {:?}", entity, err);
        AppError::from(err)
    }
}

/// Drops duplicates while keeping first-seen order.
fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

impl SqliteStore {
    /// Prerequisite links for a node set, keyed by dependent node id.
    async fn prerequisites_for(&self, node_ids: &[String]) -> Result<HashMap<String, Vec<String>>, AppError> {
        let mut links: HashMap<String, Vec<String>> = HashMap::new();
        if node_ids.is_empty() {
            return Ok(links);
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT node_id, prerequisite_node_id FROM node_prerequisites WHERE node_id IN (",
        );
        let mut separated = query_builder.separated(",");
        for id in node_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY rowid ASC");

        let rows: Vec<(String, String)> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        for (node_id, prerequisite_id) in rows {
            links.entry(node_id).or_default().push(prerequisite_id);
        }
        Ok(links)
    }

    async fn attach_prerequisites(&self, nodes: &mut [PathNode]) -> Result<(), AppError> {
        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let mut links = self.prerequisites_for(&ids).await?;
        for node in nodes.iter_mut() {
            node.prerequisite_node_ids = links.remove(&node.id).unwrap_or_default();
        }
        Ok(())
    }

    /// Rejects self references, unknown nodes, and links that would close a cycle.
    async fn check_prerequisites(&self, node_id: &str, prerequisites: &[String]) -> Result<(), AppError> {
        for prerequisite_id in prerequisites {
            if prerequisite_id == node_id {
                return Err(AppError::Integrity(format!(
                    "Node '{node_id}' cannot be its own prerequisite"
                )));
            }
            let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM path_nodes WHERE id = ?")
                .bind(prerequisite_id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if !exists {
                return Err(AppError::Integrity(format!(
                    "Prerequisite node '{prerequisite_id}' does not exist"
                )));
            }
        }

        // Walk upstream from the new prerequisites; reaching `node_id` means a cycle.
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<String> = prerequisites.iter().cloned().collect();
        while !frontier.is_empty() {
            let batch: Vec<String> = frontier
                .drain(..)
                .filter(|id| visited.insert(id.clone()))
                .collect();
            if batch.is_empty() {
                break;
            }
            for upstream in self.prerequisites_for(&batch).await?.into_values().flatten() {
                if upstream == node_id {
                    return Err(AppError::Integrity(format!(
                        "Prerequisites of node '{node_id}' would form a cycle"
                    )));
                }
                frontier.push_back(upstream);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn list_paths(&self) -> Result<Vec<LearningPath>, AppError> {
        let paths = sqlx::query_as::<_, LearningPath>(
            "SELECT * FROM learning_paths ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(paths)
    }

    async fn get_path(&self, id: &str) -> Result<Option<LearningPath>, AppError> {
        let path = sqlx::query_as::<_, LearningPath>("SELECT * FROM learning_paths WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(path)
    }

    async fn get_path_by_tech_stack(&self, tech_stack: &str) -> Result<Option<LearningPath>, AppError> {
        let path = sqlx::query_as::<_, LearningPath>(
            "SELECT * FROM learning_paths WHERE tech_stack = ?",
        )
        .bind(tech_stack.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(path)
    }

    async fn list_categories(&self, path_id: &str) -> Result<Vec<PathCategory>, AppError> {
        let categories = sqlx::query_as::<_, PathCategory>(
            r#"
            SELECT * FROM path_categories
            WHERE path_id = ?
            ORDER BY sort_order ASC, rowid ASC
            "#,
        )
        .bind(path_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: &str) -> Result<Option<PathCategory>, AppError> {
        let category = sqlx::query_as::<_, PathCategory>("SELECT * FROM path_categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn list_nodes(&self, category_id: &str) -> Result<Vec<PathNode>, AppError> {
        let mut nodes = sqlx::query_as::<_, PathNode>(
            r#"
            SELECT * FROM path_nodes
            WHERE category_id = ?
            ORDER BY sort_order ASC, rowid ASC
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_prerequisites(&mut nodes).await?;
        Ok(nodes)
    }

    async fn get_node(&self, id: &str) -> Result<Option<PathNode>, AppError> {
        let node = sqlx::query_as::<_, PathNode>("SELECT * FROM path_nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match node {
            Some(node) => {
                let mut nodes = [node];
                self.attach_prerequisites(&mut nodes).await?;
                let [node] = nodes;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    async fn list_path_nodes(&self, path_id: &str) -> Result<Vec<PathNode>, AppError> {
        let mut nodes = sqlx::query_as::<_, PathNode>(
            r#"
            SELECT n.* FROM path_nodes n
            JOIN path_categories c ON c.id = n.category_id
            WHERE c.path_id = ?
            ORDER BY c.sort_order ASC, c.rowid ASC, n.sort_order ASC, n.rowid ASC
            "#,
        )
        .bind(path_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_prerequisites(&mut nodes).await?;
        Ok(nodes)
    }

    async fn entry_node(&self, path_id: &str) -> Result<Option<PathNode>, AppError> {
        let first_category = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM path_categories
            WHERE path_id = ?
            ORDER BY sort_order ASC, rowid ASC
            LIMIT 1
            "#,
        )
        .bind(path_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(category_id) = first_category else {
            return Ok(None);
        };

        let first_node = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM path_nodes
            WHERE category_id = ?
            ORDER BY sort_order ASC, rowid ASC
            LIMIT 1
            "#,
        )
        .bind(&category_id)
        .fetch_optional(&self.pool)
        .await?;

        match first_node {
            Some(node_id) => self.get_node(&node_id).await,
            None => Ok(None),
        }
    }

    async fn create_path(&self, input: &CreatePathRequest) -> Result<LearningPath, AppError> {
        let tech_stack = input.tech_stack.trim().to_lowercase();

        if self.get_path(&input.id).await?.is_some() {
            return Err(AppError::conflict("path", &input.id));
        }
        if self.get_path_by_tech_stack(&tech_stack).await?.is_some() {
            return Err(AppError::conflict("techStack", &tech_stack));
        }

        sqlx::query(
            r#"
            INSERT INTO learning_paths
            (id, tech_stack, title, subtitle, character_icon, character_dialog, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.id)
        .bind(&tech_stack)
        .bind(&input.title)
        .bind(&input.subtitle)
        .bind(input.character_icon.as_deref().unwrap_or(DEFAULT_CHARACTER_ICON))
        .bind(input.character_dialog.as_deref().unwrap_or(DEFAULT_CHARACTER_DIALOG))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_internal(e, "path", &input.id))?;

        self.get_path(&input.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError(format!("Path '{}' vanished after insert", input.id)))
    }

    async fn update_path(&self, id: &str, input: &UpdatePathRequest) -> Result<Option<LearningPath>, AppError> {
        let Some(existing) = self.get_path(id).await? else {
            return Ok(None);
        };
        if input.is_empty() {
            return Ok(Some(existing));
        }

        let tech_stack = input.tech_stack.as_ref().map(|s| s.trim().to_lowercase());
        if let Some(stack) = &tech_stack {
            if *stack != existing.tech_stack && self.get_path_by_tech_stack(stack).await?.is_some() {
                return Err(AppError::conflict("techStack", stack));
            }
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE learning_paths SET ");
        let mut separated = builder.separated(", ");

        if let Some(stack) = &tech_stack {
            separated.push("tech_stack = ");
            separated.push_bind_unseparated(stack.clone());
        }

        if let Some(title) = &input.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title.clone());
        }

        if let Some(subtitle) = &input.subtitle {
            separated.push("subtitle = ");
            separated.push_bind_unseparated(subtitle.clone());
        }

        if let Some(icon) = &input.character_icon {
            separated.push("character_icon = ");
            separated.push_bind_unseparated(icon.clone());
        }

        if let Some(dialog) = &input.character_dialog {
            separated.push("character_dialog = ");
            separated.push_bind_unseparated(dialog.clone());
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_internal(e, "techStack", tech_stack.as_deref().unwrap_or(id)))?;

        self.get_path(id).await
    }

    async fn delete_path(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM learning_paths WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_category(&self, input: &CreateCategoryRequest) -> Result<PathCategory, AppError> {
        if self.get_path(&input.path_id).await?.is_none() {
            return Err(AppError::not_found("path", &input.path_id));
        }
        if self.get_category(&input.id).await?.is_some() {
            return Err(AppError::conflict("category", &input.id));
        }

        sqlx::query(
            r#"
            INSERT INTO path_categories (id, path_id, name, icon, color, sort_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.id)
        .bind(&input.path_id)
        .bind(&input.name)
        .bind(&input.icon)
        .bind(input.color.as_deref().unwrap_or(DEFAULT_CATEGORY_COLOR))
        .bind(input.sort_order.unwrap_or(0))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_internal(e, "category", &input.id))?;

        self.get_category(&input.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError(format!("Category '{}' vanished after insert", input.id)))
    }

    async fn update_category(&self, id: &str, input: &UpdateCategoryRequest) -> Result<Option<PathCategory>, AppError> {
        let Some(existing) = self.get_category(id).await? else {
            return Ok(None);
        };
        if input.is_empty() {
            return Ok(Some(existing));
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE path_categories SET ");
        let mut separated = builder.separated(", ");

        if let Some(name) = &input.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name.clone());
        }

        if let Some(icon) = &input.icon {
            separated.push("icon = ");
            separated.push_bind_unseparated(icon.clone());
        }

        if let Some(color) = &input.color {
            separated.push("color = ");
            separated.push_bind_unseparated(color.clone());
        }

        if let Some(sort_order) = input.sort_order {
            separated.push("sort_order = ");
            separated.push_bind_unseparated(sort_order);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        builder.build().execute(&self.pool).await?;

        self.get_category(id).await
    }

    async fn delete_category(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM path_categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_node(&self, input: &CreateNodeRequest) -> Result<PathNode, AppError> {
        if self.get_category(&input.category_id).await?.is_none() {
            return Err(AppError::not_found("category", &input.category_id));
        }
        if self.get_node(&input.id).await?.is_some() {
            return Err(AppError::conflict("node", &input.id));
        }

        let prerequisites = dedup_ids(&input.prerequisite_node_ids);
        self.check_prerequisites(&input.id, &prerequisites).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO path_nodes
            (id, category_id, title, icon, color, sort_order, question_ids, estimated_minutes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.id)
        .bind(&input.category_id)
        .bind(&input.title)
        .bind(&input.icon)
        .bind(input.color.as_deref().unwrap_or(DEFAULT_NODE_COLOR))
        .bind(input.sort_order.unwrap_or(0))
        .bind(Json(&input.question_ids))
        .bind(input.estimated_minutes.unwrap_or(DEFAULT_ESTIMATED_MINUTES))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_internal(e, "node", &input.id))?;

        for prerequisite_id in &prerequisites {
            sqlx::query("INSERT INTO node_prerequisites (node_id, prerequisite_node_id) VALUES (?, ?)")
                .bind(&input.id)
                .bind(prerequisite_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_node(&input.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError(format!("Node '{}' vanished after insert", input.id)))
    }

    async fn update_node(&self, id: &str, input: &UpdateNodeRequest) -> Result<Option<PathNode>, AppError> {
        let Some(existing) = self.get_node(id).await? else {
            return Ok(None);
        };

        let prerequisites = input.prerequisite_node_ids.as_deref().map(dedup_ids);
        if let Some(prerequisites) = &prerequisites {
            self.check_prerequisites(id, prerequisites).await?;
        }

        if input.has_no_column_changes() && prerequisites.is_none() {
            return Ok(Some(existing));
        }

        let mut tx = self.pool.begin().await?;

        if !input.has_no_column_changes() {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE path_nodes SET ");
            let mut separated = builder.separated(", ");

            if let Some(title) = &input.title {
                separated.push("title = ");
                separated.push_bind_unseparated(title.clone());
            }

            if let Some(icon) = &input.icon {
                separated.push("icon = ");
                separated.push_bind_unseparated(icon.clone());
            }

            if let Some(color) = &input.color {
                separated.push("color = ");
                separated.push_bind_unseparated(color.clone());
            }

            if let Some(sort_order) = input.sort_order {
                separated.push("sort_order = ");
                separated.push_bind_unseparated(sort_order);
            }

            if let Some(question_ids) = &input.question_ids {
                separated.push("question_ids = ");
                separated.push_bind_unseparated(Json(question_ids.clone()));
            }

            if let Some(minutes) = input.estimated_minutes {
                separated.push("estimated_minutes = ");
                separated.push_bind_unseparated(minutes);
            }

            builder.push(" WHERE id = ");
            builder.push_bind(id);

            builder.build().execute(&mut *tx).await?;
        }

        if let Some(prerequisites) = &prerequisites {
            sqlx::query("DELETE FROM node_prerequisites WHERE node_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            for prerequisite_id in prerequisites {
                sqlx::query("INSERT INTO node_prerequisites (node_id, prerequisite_node_id) VALUES (?, ?)")
                    .bind(id)
                    .bind(prerequisite_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        self.get_node(id).await
    }

    async fn delete_node(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM path_nodes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
