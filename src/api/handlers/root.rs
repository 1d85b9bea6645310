use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use utoipa::OpenApi;

use crate::api::ApiDoc;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Storefront Payments API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Payment orchestration for the storefront checkout",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "functions": "/functions",
            "openapi": "/api/openapi.json"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
