//! Route handlers.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::http::response::{ApiResponse, ResponseCode};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

pub async fn ping() -> ApiResponse<&'static str> {
    ApiResponse::success("pong")
}

pub async fn health() -> ApiResponse<HealthStatus> {
    ApiResponse::success(HealthStatus {
        status: "operational".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn not_found(uri: Uri) -> ApiResponse<()> {
    tracing::debug!(path = %uri.path(), "No route matched");
    ApiResponse::error(ResponseCode::NotFound)
}
