// src/services/path_service.rs

use std::sync::Arc;

use validator::Validate;

use crate::{
    engine::PathEngine,
    error::AppError,
    models::{
        category::{CategoryNodes, CreateCategoryRequest, PathCategory, UpdateCategoryRequest},
        node::{CompleteNodeRequest, CreateNodeRequest, NodeCompletion, PathNode, UpdateNodeRequest},
        path::{CreatePathRequest, LearningPath, PathDetail, UpdatePathRequest},
        progress::UserPathProgress,
    },
    store::CatalogStore,
};

/// Trims an identifier and rejects it when nothing is left.
fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

/// Blank caller ids are treated as anonymous.
fn caller(caller_id: Option<&str>) -> Option<&str> {
    caller_id.map(str::trim).filter(|id| !id.is_empty())
}

fn normalize_ids(ids: &[String], field: &str) -> Result<Vec<String>, AppError> {
    ids.iter()
        .map(|id| required(id, field).map(str::to_string))
        .collect()
}

/// Entry point for the path routes: validates input, sequences catalog reads
/// with ledger initialization, and shapes the responses.
#[derive(Clone)]
pub struct PathService {
    engine: PathEngine,
    catalog: Arc<dyn CatalogStore>,
    max_prerequisites: usize,
}

impl PathService {
    pub fn new(engine: PathEngine, catalog: Arc<dyn CatalogStore>, max_prerequisites: usize) -> Self {
        Self {
            engine,
            catalog,
            max_prerequisites,
        }
    }

    pub fn engine(&self) -> &PathEngine {
        &self.engine
    }

    pub async fn list_paths(&self) -> Result<Vec<LearningPath>, AppError> {
        self.catalog.list_paths().await
    }

    /// Looks the path up by id first, then by tech stack.
    pub async fn get_path(&self, key: &str, caller_id: Option<&str>) -> Result<PathDetail, AppError> {
        let key = required(key, "path id")?;

        let path = match self.catalog.get_path(key).await? {
            Some(path) => path,
            None => self
                .catalog
                .get_path_by_tech_stack(key)
                .await?
                .ok_or_else(|| AppError::not_found("path", key))?,
        };

        self.path_detail(path, caller(caller_id)).await
    }

    pub async fn get_path_by_tech_stack(&self, tech_stack: &str, caller_id: Option<&str>) -> Result<PathDetail, AppError> {
        let tech_stack = required(tech_stack, "techStack")?.to_lowercase();

        let path = self
            .catalog
            .get_path_by_tech_stack(&tech_stack)
            .await?
            .ok_or_else(|| AppError::not_found("techStack", tech_stack.as_str()))?;

        self.path_detail(path, caller(caller_id)).await
    }

    async fn path_detail(&self, path: LearningPath, caller_id: Option<&str>) -> Result<PathDetail, AppError> {
        let categories = self.catalog.list_categories(&path.id).await?;

        let progress = match caller_id {
            Some(user_id) => {
                self.engine.initialize(user_id, &path.id).await?;
                Some(self.engine.path_progress(user_id, &path.id).await?)
            }
            None => None,
        };

        Ok(PathDetail {
            path,
            categories,
            progress,
        })
    }

    pub async fn list_category_nodes(&self, category_id: &str, caller_id: Option<&str>) -> Result<CategoryNodes, AppError> {
        let category_id = required(category_id, "categoryId")?;

        let category = self
            .catalog
            .get_category(category_id)
            .await?
            .ok_or_else(|| AppError::not_found("category", category_id))?;

        let nodes = self.engine.list_nodes(&category, caller(caller_id)).await?;

        Ok(CategoryNodes { category, nodes })
    }

    pub async fn complete_node(
        &self,
        caller_id: &str,
        node_id: &str,
        request: CompleteNodeRequest,
    ) -> Result<NodeCompletion, AppError> {
        request.validate()?;

        let completion = self
            .engine
            .complete_node(
                caller_id.trim(),
                node_id.trim(),
                request.correct_count,
                request.total_count,
            )
            .await?;

        tracing::info!(
            "Node {} completed by {} ({}/{}), next: {:?}",
            completion.node.id,
            completion.progress.user_id,
            completion.progress.correct_count,
            completion.progress.total_count,
            completion.next_node.as_ref().map(|n| n.id.as_str())
        );

        Ok(completion)
    }

    pub async fn get_user_path_progress(&self, caller_id: &str, path_id: &str) -> Result<UserPathProgress, AppError> {
        let user_id = required(caller_id, "userId")?;
        let path_id = required(path_id, "path id")?;

        let path = self
            .catalog
            .get_path(path_id)
            .await?
            .ok_or_else(|| AppError::not_found("path", path_id))?;

        self.engine.initialize(user_id, &path.id).await?;
        let progress = self.engine.path_progress(user_id, &path.id).await?;

        Ok(UserPathProgress { path, progress })
    }

    // Admin operations

    pub async fn create_path(&self, mut request: CreatePathRequest) -> Result<LearningPath, AppError> {
        request.validate()?;
        request.id = required(&request.id, "id")?.to_string();
        request.tech_stack = required(&request.tech_stack, "techStack")?.to_lowercase();
        required(&request.title, "title")?;

        let path = self.catalog.create_path(&request).await?;
        tracing::info!("Created path {} ({})", path.id, path.tech_stack);
        Ok(path)
    }

    pub async fn update_path(&self, id: &str, mut request: UpdatePathRequest) -> Result<LearningPath, AppError> {
        request.validate()?;
        let id = required(id, "path id")?;
        if let Some(stack) = &request.tech_stack {
            request.tech_stack = Some(required(stack, "techStack")?.to_lowercase());
        }

        let path = self
            .catalog
            .update_path(id, &request)
            .await?
            .ok_or_else(|| AppError::not_found("path", id))?;
        tracing::info!("Updated path {}", path.id);
        Ok(path)
    }

    pub async fn delete_path(&self, id: &str) -> Result<(), AppError> {
        let id = required(id, "path id")?;
        if !self.catalog.delete_path(id).await? {
            return Err(AppError::not_found("path", id));
        }
        tracing::info!("Deleted path {} with its categories and nodes", id);
        Ok(())
    }

    pub async fn create_category(&self, mut request: CreateCategoryRequest) -> Result<PathCategory, AppError> {
        request.validate()?;
        request.id = required(&request.id, "id")?.to_string();
        request.path_id = required(&request.path_id, "pathId")?.to_string();
        required(&request.name, "name")?;

        let category = self.catalog.create_category(&request).await?;
        tracing::info!("Created category {} in path {}", category.id, category.path_id);
        Ok(category)
    }

    pub async fn update_category(&self, id: &str, request: UpdateCategoryRequest) -> Result<PathCategory, AppError> {
        request.validate()?;
        let id = required(id, "category id")?;

        let category = self
            .catalog
            .update_category(id, &request)
            .await?
            .ok_or_else(|| AppError::not_found("category", id))?;
        tracing::info!("Updated category {}", category.id);
        Ok(category)
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), AppError> {
        let id = required(id, "category id")?;
        if !self.catalog.delete_category(id).await? {
            return Err(AppError::not_found("category", id));
        }
        tracing::info!("Deleted category {}", id);
        Ok(())
    }

    pub async fn create_node(&self, mut request: CreateNodeRequest) -> Result<PathNode, AppError> {
        request.validate()?;
        request.id = required(&request.id, "id")?.to_string();
        request.category_id = required(&request.category_id, "categoryId")?.to_string();
        required(&request.title, "title")?;
        request.prerequisite_node_ids = normalize_ids(&request.prerequisite_node_ids, "prerequisiteNodeIds")?;
        self.check_prerequisite_count(&request.prerequisite_node_ids)?;

        let node = self.catalog.create_node(&request).await?;
        tracing::info!("Created node {} in category {}", node.id, node.category_id);
        Ok(node)
    }

    pub async fn update_node(&self, id: &str, mut request: UpdateNodeRequest) -> Result<PathNode, AppError> {
        request.validate()?;
        let id = required(id, "node id")?;
        if let Some(ids) = &request.prerequisite_node_ids {
            let ids = normalize_ids(ids, "prerequisiteNodeIds")?;
            self.check_prerequisite_count(&ids)?;
            request.prerequisite_node_ids = Some(ids);
        }

        let node = self
            .catalog
            .update_node(id, &request)
            .await?
            .ok_or_else(|| AppError::not_found("node", id))?;
        tracing::info!("Updated node {}", node.id);
        Ok(node)
    }

    pub async fn delete_node(&self, id: &str) -> Result<(), AppError> {
        let id = required(id, "node id")?;
        if !self.catalog.delete_node(id).await? {
            return Err(AppError::not_found("node", id));
        }
        tracing::info!("Deleted node {}", id);
        Ok(())
    }

    fn check_prerequisite_count(&self, ids: &[String]) -> Result<(), AppError> {
        if ids.len() > self.max_prerequisites {
            return Err(AppError::Integrity(format!(
                "A node may declare at most {} prerequisite(s)",
                self.max_prerequisites
            )));
        }
        Ok(())
    }
}
