use async_trait::async_trait;
use thiserror::Error;

use crate::{
    config::DeploymentEnvironment,
    domain::{PaymentRequest, PaymentStatus},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure or timeout; the provider may or may not have seen the request.
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("invalid payment id: {0}")]
    InvalidPaymentId(String),
}

/// Normalized view of a payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    /// Our order id, echoed back by the gateway.
    pub external_reference: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentOption {
    pub installments: u32,
    pub installment_rate: f64,
    pub installment_amount_cents: i64,
    pub total_amount_cents: i64,
    pub labels: Vec<String>,
}

/// Stateless adapter over the payment provider. Implementations never retry;
/// retry decisions belong to the caller.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn environment(&self) -> DeploymentEnvironment;

    fn public_key(&self) -> &str;

    async fn create_payment(
        &self,
        request: &PaymentRequest,
        idempotency_key: &str,
    ) -> Result<GatewayPayment, GatewayError>;

    async fn get_payment(&self, external_id: &str) -> Result<GatewayPayment, GatewayError>;

    async fn installment_options(
        &self,
        amount_cents: i64,
        payment_method_id: &str,
        issuer_id: Option<&str>,
    ) -> Result<Vec<InstallmentOption>, GatewayError>;
}
