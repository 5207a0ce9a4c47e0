// src/handlers/paths.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

use crate::{
    error::AppError,
    models::node::CompleteNodeRequest,
    services::PathService,
    utils::device_id::{DeviceId, OptionalDeviceId},
};

/// Lists every learning path, oldest first.
pub async fn list_paths(State(service): State<Arc<PathService>>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.list_paths().await?))
}

/// Retrieves a path with its categories.
///
/// The key is tried as a path id, then as a tech stack.
/// With `X-Device-ID` the caller's progress is initialized and included.
pub async fn get_path(
    State(service): State<Arc<PathService>>,
    OptionalDeviceId(device_id): OptionalDeviceId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let detail = service.get_path(&id, device_id.as_deref()).await?;
    Ok(Json(detail))
}

/// Retrieves a path by tech stack (case-insensitive).
pub async fn get_path_by_tech_stack(
    State(service): State<Arc<PathService>>,
    OptionalDeviceId(device_id): OptionalDeviceId,
    Path(tech_stack): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let detail = service
        .get_path_by_tech_stack(&tech_stack, device_id.as_deref())
        .await?;
    Ok(Json(detail))
}

/// Aggregate completion of a path for the calling device.
pub async fn get_path_progress(
    State(service): State<Arc<PathService>>,
    DeviceId(device_id): DeviceId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let progress = service.get_user_path_progress(&device_id, &id).await?;
    Ok(Json(progress))
}

/// Lists a category's nodes, with lock status when the caller is known.
pub async fn list_category_nodes(
    State(service): State<Arc<PathService>>,
    OptionalDeviceId(device_id): OptionalDeviceId,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let nodes = service
        .list_category_nodes(&category_id, device_id.as_deref())
        .await?;
    Ok(Json(nodes))
}

/// Records answer counts for a node.
///
/// Body: `{"correctCount": n, "totalCount": m}`. Non-numeric counts are rejected with 400.
pub async fn complete_node(
    State(service): State<Arc<PathService>>,
    DeviceId(device_id): DeviceId,
    Path(node_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    // Parsed by hand so a wrongly typed count is a 400 from AppError, not axum's 422.
    let request: CompleteNodeRequest = serde_json::from_value(body)?;
    let completion = service.complete_node(&device_id, &node_id, request).await?;
    Ok(Json(completion))
}
