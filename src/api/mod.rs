pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::{
    config::Settings,
    payments::PaymentGateway,
    service::ServiceContext,
};
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::payments::submit_payment,
        handlers::payments::check_status,
        handlers::payments::get_installments,
        handlers::payments::get_public_key,
        handlers::webhook::payment_webhook
    ),
    components(
        schemas(
            handlers::payments::SubmitPaymentRequest,
            handlers::payments::CheckStatusRequest,
            handlers::payments::InstallmentsRequest,
            handlers::payments::PublicKeyResponse,
            crate::domain::OrderData,
            crate::domain::OrderItemData,
            crate::domain::Payer,
            crate::domain::Identification,
            crate::domain::PaymentMethod,
            crate::domain::PaymentStatus,
            crate::config::DeploymentEnvironment,
            crate::payments::installments::InstallmentView,
            crate::service::PaymentData,
            crate::service::PaymentResult,
            crate::service::StatusResult,
            crate::service::WebhookEvent,
            crate::service::webhook_service::WebhookData
        )
    ),
    tags(
        (name = "payments", description = "Checkout payment functions"),
        (name = "webhooks", description = "Gateway notifications")
    )
)]
pub struct ApiDoc;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, gateway, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .route("/api/openapi.json", get(handlers::root::openapi))
        .nest("/functions", function_routes())
        .with_state(app_state)
        .layer(axum_middleware::from_fn(middleware::cors::preflight))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn function_routes() -> Router<AppState> {
    Router::new()
        .route("/submit-payment", post(handlers::payments::submit_payment))
        .route("/check-status", post(handlers::payments::check_status))
        .route("/get-installments", post(handlers::payments::get_installments))
        .route("/get-public-key", get(handlers::payments::get_public_key))
        .route("/webhook", post(handlers::webhook::payment_webhook))
}
