use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{installments::InstallmentView, PaymentGateway},
    repository::{IdempotencyRepository, OrderRepository, PaymentRepository},
    service::rate_limiter::RateLimiter,
};

/// Method-specific fields sent by checkout alongside the order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PaymentData {
    pub token: Option<String>,
    pub payment_method_id: Option<String>,
    pub installments: Option<u32>,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub issuer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    /// Gateway payment id.
    pub id: String,
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub duplicate: bool,
}

impl PaymentResult {
    fn from_payment(payment: &Payment, duplicate: bool) -> Self {
        let metadata = match &payment.metadata {
            serde_json::Value::Object(map) if map.is_empty() => None,
            serde_json::Value::Null => None,
            other => Some(other.clone()),
        };

        Self {
            id: payment.external_id.clone(),
            payment_id: payment.id,
            status: payment.status,
            metadata,
            duplicate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusResult {
    pub id: String,
    pub status: PaymentStatus,
    /// Whether the stored status changed as a result of this poll.
    pub updated: bool,
}

/// Orchestrates one checkout attempt: rate limit, validation, idempotency,
/// gateway call, persistence.
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    rate_limiter: Arc<dyn RateLimiter>,
    payment_repo: Arc<dyn PaymentRepository>,
    order_repo: Arc<dyn OrderRepository>,
    idempotency_repo: Arc<dyn IdempotencyRepository>,
    idempotency_ttl: Duration,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        rate_limiter: Arc<dyn RateLimiter>,
        payment_repo: Arc<dyn PaymentRepository>,
        order_repo: Arc<dyn OrderRepository>,
        idempotency_repo: Arc<dyn IdempotencyRepository>,
        idempotency_ttl: Duration,
    ) -> Self {
        Self {
            gateway,
            rate_limiter,
            payment_repo,
            order_repo,
            idempotency_repo,
            idempotency_ttl,
        }
    }

    pub async fn submit(
        &self,
        order: OrderData,
        method: PaymentMethod,
        payment_data: PaymentData,
        idempotency_key: &str,
    ) -> Result<PaymentResult> {
        let identifier = rate_limit_identifier(&order);
        if !self.rate_limiter.is_allowed(&identifier) {
            let retry_after = self.rate_limiter.remaining_block_time(&identifier);
            tracing::warn!(identifier = %identifier, "Payment submission rate limited");
            return Err(AppError::RateLimited { retry_after });
        }

        let idempotency_key = idempotency_key.trim();
        if idempotency_key.is_empty() {
            return Err(AppError::Validation("x-idempotency-key header is required".to_string()));
        }

        let request = build_payment_request(order, method, payment_data)?;

        if let Some(record) = self
            .idempotency_repo
            .find_active(idempotency_key, Utc::now())
            .await?
        {
            tracing::info!(
                idempotency_key,
                external_id = %record.external_id,
                "Duplicate payment submission, returning stored result"
            );
            return self.duplicate_result(&record, &request.user_id).await;
        }

        let gateway_payment = self
            .gateway
            .create_payment(&request, idempotency_key)
            .await
            .map_err(|e| {
                tracing::error!(
                    order_id = %request.order_id,
                    "Gateway rejected payment submission: {}",
                    e
                );
                AppError::from(e)
            })?;

        let now = Utc::now();
        let payment = self
            .payment_repo
            .create(Payment {
                id: Uuid::new_v4(),
                external_id: gateway_payment.id.clone(),
                order_id: request.order_id.clone(),
                user_id: request.user_id.clone(),
                amount_cents: request.amount_cents,
                method: request.method(),
                status: gateway_payment.status,
                metadata: gateway_payment.metadata.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            order_id = %payment.order_id,
            external_id = %payment.external_id,
            status = payment.status.as_str(),
            "Payment created"
        );

        if let Err(e) = self
            .order_repo
            .attach_payment(&payment.order_id, &payment.external_id)
            .await
        {
            tracing::warn!(
                order_id = %payment.order_id,
                "Failed to link payment {} to order: {}",
                payment.external_id,
                e
            );
        }

        let record =
            IdempotencyRecord::for_payment(idempotency_key, &payment, Utc::now(), self.idempotency_ttl);

        match self.idempotency_repo.insert(&record).await {
            Ok(true) => Ok(PaymentResult::from_payment(&payment, false)),
            Ok(false) => {
                // Key already claimed; answer with the stored payment.
                match self
                    .idempotency_repo
                    .find_active(idempotency_key, Utc::now())
                    .await
                {
                    Ok(Some(winner)) => self.duplicate_result(&winner, &request.user_id).await,
                    Ok(None) => Ok(PaymentResult::from_payment(&payment, false)),
                    Err(e) => {
                        tracing::error!("Failed to read winning idempotency record: {}", e);
                        Ok(PaymentResult::from_payment(&payment, false))
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    external_id = %payment.external_id,
                    "Failed to save idempotency record: {}",
                    e
                );
                Ok(PaymentResult::from_payment(&payment, false))
            }
        }
    }

    async fn duplicate_result(&self, record: &IdempotencyRecord, user_id: &str) -> Result<PaymentResult> {
        if record.user_id != user_id {
            tracing::warn!(
                idempotency_key = %record.idempotency_key,
                "Idempotency key reused by a different user"
            );
            return Err(AppError::Validation(
                "x-idempotency-key is already in use".to_string(),
            ));
        }

        match self.payment_repo.find_by_id(record.payment_id).await? {
            Some(payment) => Ok(PaymentResult::from_payment(&payment, true)),
            None => Ok(PaymentResult {
                id: record.external_id.clone(),
                payment_id: record.payment_id,
                status: PaymentStatus::Pending,
                metadata: None,
                duplicate: true,
            }),
        }
    }

    /// Polls the gateway for the current status and syncs the stored payment.
    pub async fn check_status(&self, payment_id: &str) -> Result<StatusResult> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Err(AppError::Validation("paymentId is required".to_string()));
        }

        let payment = match self.payment_repo.find_by_external_id(payment_id).await? {
            Some(payment) => payment,
            None => {
                let by_id = match Uuid::parse_str(payment_id) {
                    Ok(id) => self.payment_repo.find_by_id(id).await?,
                    Err(_) => None,
                };
                by_id.ok_or_else(|| {
                    AppError::BadRequest(format!("Payment {} not found", payment_id))
                })?
            }
        };

        let remote = self.gateway.get_payment(&payment.external_id).await?;
        let updated = remote.status != payment.status;

        if updated {
            if let Err(e) = self
                .payment_repo
                .update_status(payment.id, remote.status, Some(remote.metadata.clone()))
                .await
            {
                tracing::warn!(
                    external_id = %payment.external_id,
                    "Failed to sync payment status: {}",
                    e
                );
            }
        }

        Ok(StatusResult {
            id: payment.external_id,
            status: remote.status,
            updated,
        })
    }

    pub async fn installments(
        &self,
        amount: f64,
        payment_method_id: &str,
        issuer_id: Option<&str>,
    ) -> Result<Vec<InstallmentView>> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation("amount must be greater than zero".to_string()));
        }
        if payment_method_id.trim().is_empty() {
            return Err(AppError::Validation("payment_method_id is required".to_string()));
        }

        let options = self
            .gateway
            .installment_options(
                to_cents(amount),
                payment_method_id.trim(),
                issuer_id.map(str::trim).filter(|i| !i.is_empty()),
            )
            .await?;

        Ok(options.into_iter().map(InstallmentView::from).collect())
    }
}

fn rate_limit_identifier(order: &OrderData) -> String {
    let user_id = order.user_id.trim();
    if user_id.is_empty() {
        "anonymous".to_string()
    } else {
        user_id.to_string()
    }
}

/// Structural validation of a submission. Reports the first violation found.
pub fn build_payment_request(
    order: OrderData,
    method: PaymentMethod,
    payment_data: PaymentData,
) -> Result<PaymentRequest> {
    let invalid = |msg: &str| Err(AppError::Validation(msg.to_string()));

    if order.order_id.trim().is_empty() {
        return invalid("orderData.orderId is required");
    }
    if order.user_id.trim().is_empty() {
        return invalid("orderData.userId is required");
    }
    if order.items.is_empty() {
        return invalid("orderData.items must not be empty");
    }
    for (index, item) in order.items.iter().enumerate() {
        if item.product_id.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "orderData.items[{}].productId is required",
                index
            )));
        }
        if item.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "orderData.items[{}].quantity must be positive",
                index
            )));
        }
        if !item.unit_price.is_finite() || item.unit_price <= 0.0 {
            return Err(AppError::Validation(format!(
                "orderData.items[{}].unitPrice must be positive",
                index
            )));
        }
    }
    if !order.total_amount.is_finite() || to_cents(order.total_amount) <= 0 {
        return invalid("orderData.totalAmount must be positive");
    }

    let payer = match order.payer {
        Some(payer) => payer,
        None => return invalid("orderData.payer is required"),
    };
    if !payer.email.validate_email() {
        return invalid("orderData.payer.email must be a valid e-mail address");
    }

    let method_details = match method {
        PaymentMethod::InstantTransfer => MethodDetails::InstantTransfer,
        PaymentMethod::Card => {
            let token = match payment_data.token.filter(|t| !t.trim().is_empty()) {
                Some(token) => token,
                None => return invalid("paymentData.token is required for card payments"),
            };
            let payment_method_id = match payment_data
                .payment_method_id
                .filter(|m| !m.trim().is_empty())
            {
                Some(id) => id,
                None => {
                    return invalid("paymentData.payment_method_id is required for card payments")
                }
            };
            let installments = payment_data.installments.unwrap_or(1);
            if installments == 0 {
                return invalid("paymentData.installments must be at least 1");
            }

            MethodDetails::Card {
                token,
                payment_method_id,
                installments,
                issuer_id: payment_data.issuer_id.filter(|i| !i.trim().is_empty()),
            }
        }
    };

    let description = order
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Pedido {}", order.order_id));

    Ok(PaymentRequest {
        amount_cents: to_cents(order.total_amount),
        order_id: order.order_id,
        user_id: order.user_id,
        description,
        payer,
        method_details,
    })
}
