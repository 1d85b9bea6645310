use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::{
    api::state::AppState,
    error::{AppError, Result},
    payments::signature,
    service::{WebhookEvent, WebhookOutcome},
};

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[utoipa::path(
    post,
    path = "/functions/webhook",
    tag = "webhooks",
    request_body = WebhookEvent,
    responses(
        (status = 200, description = "Notification acknowledged", body = String, content_type = "text/plain"),
        (status = 400, description = "Malformed notification"),
        (status = 401, description = "Signature mismatch"),
        (status = 404, description = "No order for the notified payment"),
        (status = 500, description = "Gateway or store unreachable")
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<WebhookEvent>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(event) = body.map_err(|rejection| {
        tracing::warn!("Malformed webhook body: {}", rejection.body_text());
        AppError::BadRequest("Malformed webhook body".to_string())
    })?;

    if let Some(secret) = state
        .settings
        .gateway
        .webhook_secret
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let request_id = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok());

        if !signature::verify(secret, header, request_id, &event.data.id) {
            tracing::warn!(data_id = %event.data.id, "Rejected webhook with invalid signature");
            return Err(AppError::Unauthorized);
        }
    }

    let outcome = state.webhooks()?.handle(&event).await?;
    match outcome {
        WebhookOutcome::Ignored => {}
        WebhookOutcome::Synced(status) => {
            tracing::debug!(data_id = %event.data.id, status = status.as_str(), "Webhook synced payment")
        }
        WebhookOutcome::OrderPaid => tracing::info!(data_id = %event.data.id, "Webhook fulfilled order"),
        WebhookOutcome::AlreadyProcessed => {
            tracing::debug!(data_id = %event.data.id, "Duplicate webhook delivery")
        }
    }

    Ok((StatusCode::OK, "OK"))
}
