use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::state::AppState,
    config::DeploymentEnvironment,
    domain::{wire, OrderData, PaymentMethod},
    error::{AppError, Result},
    payments::installments::InstallmentView,
    service::{PaymentData, PaymentResult, StatusResult},
};

pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    pub order_data: OrderData,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_data: PaymentData,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusRequest {
    #[serde(default, deserialize_with = "wire::string_or_number")]
    pub payment_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InstallmentsRequest {
    pub amount: f64,
    pub payment_method_id: String,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub issuer_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
    pub environment: DeploymentEnvironment,
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

#[utoipa::path(
    post,
    path = "/functions/submit-payment",
    tag = "payments",
    request_body = SubmitPaymentRequest,
    params(
        ("x-idempotency-key" = String, Header, description = "Client-generated key, stable across retries of one intent")
    ),
    responses(
        (status = 200, description = "Payment created or duplicate returned", body = PaymentResult),
        (status = 400, description = "Missing header, invalid order or payment rejected"),
        (status = 429, description = "Too many attempts"),
        (status = 500, description = "Gateway or configuration error")
    )
)]
pub async fn submit_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<SubmitPaymentRequest>, JsonRejection>,
) -> Result<Json<PaymentResult>> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            AppError::Validation(format!("{} header is required", IDEMPOTENCY_HEADER))
        })?
        .to_string();

    let request = json_body(body)?;
    let result = state
        .payments()?
        .submit(
            request.order_data,
            request.payment_method,
            request.payment_data,
            &idempotency_key,
        )
        .await?;

    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/functions/check-status",
    tag = "payments",
    request_body = CheckStatusRequest,
    responses(
        (status = 200, description = "Current gateway status", body = StatusResult),
        (status = 400, description = "Unknown payment"),
        (status = 500, description = "Gateway or configuration error")
    )
)]
pub async fn check_status(
    State(state): State<AppState>,
    body: std::result::Result<Json<CheckStatusRequest>, JsonRejection>,
) -> Result<Json<StatusResult>> {
    let request = json_body(body)?;
    let result = state.payments()?.check_status(&request.payment_id).await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/functions/get-installments",
    tag = "payments",
    request_body = InstallmentsRequest,
    responses(
        (status = 200, description = "Installment plans", body = Vec<InstallmentView>),
        (status = 400, description = "Invalid amount or method")
    )
)]
pub async fn get_installments(
    State(state): State<AppState>,
    body: std::result::Result<Json<InstallmentsRequest>, JsonRejection>,
) -> Result<Json<Vec<InstallmentView>>> {
    let request = json_body(body)?;
    let options = state
        .payments()?
        .installments(
            request.amount,
            &request.payment_method_id,
            request.issuer_id.as_deref(),
        )
        .await?;

    Ok(Json(options))
}

#[utoipa::path(
    get,
    path = "/functions/get-public-key",
    tag = "payments",
    responses(
        (status = 200, description = "Browser-side tokenization key", body = PublicKeyResponse),
        (status = 500, description = "Credentials missing")
    )
)]
pub async fn get_public_key(State(state): State<AppState>) -> Result<Json<PublicKeyResponse>> {
    let gateway = state.gateway()?;
    Ok(Json(PublicKeyResponse {
        public_key: gateway.public_key().to_string(),
        environment: gateway.environment(),
    }))
}
