// src/utils/device_id.rs

use std::sync::LazyLock;

use axum::{extract::FromRequestParts, http::request::Parts};
use regex::Regex;

use crate::error::AppError;

pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Opaque token shape accepted from clients. The engine never looks inside it.
static DEVICE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid device id pattern"));

fn read_device_id(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(value) = parts.headers.get(DEVICE_ID_HEADER) else {
        return Ok(None);
    };

    let id = value
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid X-Device-ID header".to_string()))?
        .trim();

    if !DEVICE_ID_PATTERN.is_match(id) {
        return Err(AppError::BadRequest("Invalid X-Device-ID header".to_string()));
    }
    Ok(Some(id.to_string()))
}

/// Caller identity from `X-Device-ID`, absent for anonymous browsing.
#[derive(Debug, Clone)]
pub struct OptionalDeviceId(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for OptionalDeviceId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalDeviceId(read_device_id(parts)?))
    }
}

/// Caller identity from `X-Device-ID`; 400 when the header is missing.
#[derive(Debug, Clone)]
pub struct DeviceId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for DeviceId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        read_device_id(parts)?
            .map(DeviceId)
            .ok_or_else(|| AppError::BadRequest("Missing X-Device-ID header".to_string()))
    }
}
