// src/handlers/admin.rs

//! Catalog maintenance. Every route here sits behind the admin API key.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        category::{CreateCategoryRequest, UpdateCategoryRequest},
        node::{CreateNodeRequest, UpdateNodeRequest},
        path::{CreatePathRequest, UpdatePathRequest},
    },
    services::PathService,
};

/// Creates a new learning path. Tech stack is stored lowercase.
pub async fn create_path(
    State(service): State<Arc<PathService>>,
    Json(payload): Json<CreatePathRequest>,
) -> Result<impl IntoResponse, AppError> {
    let path = service.create_path(payload).await?;
    Ok((StatusCode::CREATED, Json(path)))
}

pub async fn update_path(
    State(service): State<Arc<PathService>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePathRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.update_path(&id, payload).await?))
}

/// Deletes a path together with its categories, nodes and progress rows.
pub async fn delete_path(
    State(service): State<Arc<PathService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_path(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_category(
    State(service): State<Arc<PathService>>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = service.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(service): State<Arc<PathService>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.update_category(&id, payload).await?))
}

pub async fn delete_category(
    State(service): State<Arc<PathService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_category(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates a node. Prerequisites must already exist.
pub async fn create_node(
    State(service): State<Arc<PathService>>,
    Json(payload): Json<CreateNodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let node = service.create_node(payload).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn update_node(
    State(service): State<Arc<PathService>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateNodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.update_node(&id, payload).await?))
}

pub async fn delete_node(
    State(service): State<Arc<PathService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_node(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
