// src/utils/api_key.rs

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{config::Config, error::AppError};

pub const ADMIN_API_KEY_HEADER: &str = "x-admin-api-key";

/// Axum Middleware: Admin API key.
///
/// Rejects the request with 401 unless `X-Admin-API-Key` matches the configured key.
pub async fn admin_key_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        None => Err(AppError::AuthError("Missing X-Admin-API-Key header".to_string())),
        Some(key) if key != config.admin_api_key => {
            tracing::warn!("Rejected admin request with an invalid API key");
            Err(AppError::AuthError("Invalid API key".to_string()))
        }
        Some(_) => Ok(next.run(req).await),
    }
}
