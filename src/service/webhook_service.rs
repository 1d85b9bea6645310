use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{GatewayError, PaymentGateway},
    repository::{InventoryRepository, OrderRepository, PaymentRepository},
};

/// Notification body posted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    pub action: Option<String>,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookData {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment notification.
    Ignored,
    /// Payment status synced; order left as it was.
    Synced(PaymentStatus),
    /// This delivery moved the order to paid.
    OrderPaid,
    /// The order had already been marked paid by an earlier delivery.
    AlreadyProcessed,
}

/// Applies gateway notifications to orders and inventory.
///
/// Deliveries are at-least-once and may arrive concurrently, so the status is
/// always re-read from the gateway and the pending -> paid transition is a
/// single conditional update. Only the delivery that wins it touches stock.
pub struct WebhookService {
    gateway: Arc<dyn PaymentGateway>,
    payment_repo: Arc<dyn PaymentRepository>,
    order_repo: Arc<dyn OrderRepository>,
    inventory_repo: Arc<dyn InventoryRepository>,
}

impl WebhookService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        payment_repo: Arc<dyn PaymentRepository>,
        order_repo: Arc<dyn OrderRepository>,
        inventory_repo: Arc<dyn InventoryRepository>,
    ) -> Self {
        Self {
            gateway,
            payment_repo,
            order_repo,
            inventory_repo,
        }
    }

    pub async fn handle(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        if event.event_type != "payment" {
            tracing::debug!(event_type = %event.event_type, "Ignoring non-payment notification");
            return Ok(WebhookOutcome::Ignored);
        }

        let external_id = event.data.id.trim();
        if external_id.is_empty() {
            return Err(AppError::BadRequest("data.id is required".to_string()));
        }

        let remote = match self.gateway.get_payment(external_id).await {
            Ok(payment) => payment,
            Err(GatewayError::Api { status: 404, .. }) | Err(GatewayError::InvalidPaymentId(_)) => {
                tracing::warn!(external_id, "Notified payment unknown to gateway");
                return Err(AppError::NotFound(format!("Payment {} not found", external_id)));
            }
            Err(e) => {
                tracing::error!(external_id, "Failed to fetch notified payment: {}", e);
                return Err(AppError::from(e));
            }
        };

        let order = match self.order_repo.find_by_payment_id(&remote.id).await? {
            Some(order) => Some(order),
            None => match remote.external_reference.as_deref() {
                Some(reference) if !reference.is_empty() => {
                    self.order_repo.find_by_id(reference).await?
                }
                _ => None,
            },
        };
        let order = order.ok_or_else(|| {
            tracing::warn!(external_id = %remote.id, "No order found for notified payment");
            AppError::NotFound(format!("Order for payment {} not found", remote.id))
        })?;

        self.sync_payment(&remote.id, remote.status, &remote.metadata).await;

        if remote.status != PaymentStatus::Approved {
            tracing::info!(
                order_id = %order.id,
                status = remote.status.as_str(),
                status_detail = remote.status_detail.as_deref().unwrap_or("-"),
                "Payment not approved, order unchanged"
            );
            return Ok(WebhookOutcome::Synced(remote.status));
        }

        if !self.order_repo.mark_paid(&order.id, &remote.id).await? {
            tracing::info!(order_id = %order.id, "Order already paid, skipping fulfillment");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        tracing::info!(order_id = %order.id, external_id = %remote.id, "Order marked as paid");

        for item in &order.items {
            match self
                .inventory_repo
                .decrement_stock(&item.product_id, item.quantity)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::error!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    "Insufficient stock while fulfilling paid order"
                ),
                Err(e) => tracing::error!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    "Failed to decrement stock: {}",
                    e
                ),
            }
        }

        Ok(WebhookOutcome::OrderPaid)
    }

    /// Secondary write; the order transition does not depend on it.
    async fn sync_payment(&self, external_id: &str, status: PaymentStatus, metadata: &serde_json::Value) {
        let stored = match self.payment_repo.find_by_external_id(external_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                tracing::warn!(external_id, "Notified payment has no local record");
                return;
            }
            Err(e) => {
                tracing::warn!(external_id, "Failed to load payment record: {}", e);
                return;
            }
        };

        if stored.status == status {
            return;
        }

        if let Err(e) = self
            .payment_repo
            .update_status(stored.id, status, Some(metadata.clone()))
            .await
        {
            tracing::warn!(external_id, "Failed to sync payment status: {}", e);
        }
    }
}
