use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::payments::GatewayError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited: retry in {}s", retry_after_secs(.retry_after))]
    RateLimited { retry_after: Duration },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Whole seconds a client should wait, rounded up so a sub-second
/// cooldown never reads as "0".
pub fn retry_after_secs(retry_after: &Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::RateLimited { retry_after } => return rate_limited_response(retry_after),
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Configuration(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Payment service is not configured".to_string(),
                    None,
                )
            }
            AppError::Gateway(ref err) => gateway_response_parts(err),
            AppError::Persistence(ref msg) => {
                tracing::error!("Persistence error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = match details {
            Some(details) => Json(json!({ "error": error_message, "details": details })),
            None => Json(json!({ "error": error_message })),
        };

        (status, body).into_response()
    }
}

fn rate_limited_response(retry_after: Duration) -> Response {
    let secs = retry_after_secs(&retry_after);
    let body = Json(json!({
        "error": format!("Too many payment attempts. Try again in {} seconds", secs),
        "retry_after": secs,
    }));
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, secs.to_string())],
        body,
    )
        .into_response()
}

// Provider 4xx responses are business rejections the buyer can act on, so the
// provider's own message is passed through. Credential failures and outages
// stay opaque.
fn gateway_response_parts(err: &GatewayError) -> (StatusCode, String, Option<serde_json::Value>) {
    match err {
        GatewayError::Api { status, body } if *status == 401 || *status == 403 => {
            tracing::error!("Gateway rejected credentials (status {}): {}", status, body);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Payment provider configuration error".to_string(),
                None,
            )
        }
        GatewayError::Api { status, body } if (400..500).contains(status) => {
            tracing::warn!("Gateway rejected request (status {}): {}", status, body);
            let details = serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::Value::String(body.clone()));
            (
                StatusCode::BAD_REQUEST,
                "Payment rejected by provider".to_string(),
                Some(details),
            )
        }
        GatewayError::InvalidPaymentId(id) => (
            StatusCode::BAD_REQUEST,
            format!("Invalid payment id: {}", id),
            None,
        ),
        other => {
            tracing::error!("Gateway failure: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Payment provider unavailable".to_string(),
                None,
            )
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}
