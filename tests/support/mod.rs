#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::Barrier;

use storefront::{
    config::{DeploymentEnvironment, Settings},
    domain::*,
    payments::{GatewayError, GatewayPayment, InstallmentOption, PaymentGateway},
    repository::{InventoryRepository, OrderRepository},
    service::ServiceContext,
};

/// In-memory stand-in for the payment provider.
///
/// Like the real provider it answers repeated creates carrying the same
/// idempotency key with the payment created the first time, unless
/// `without_key_dedup` is used.
pub struct FakeGateway {
    create_calls: AtomicUsize,
    next_id: AtomicU64,
    dedup_by_key: bool,
    barrier: Option<Barrier>,
    fail_with: Option<u16>,
    keys: Mutex<HashMap<String, String>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            next_id: AtomicU64::new(1_000),
            dedup_by_key: true,
            barrier: None,
            fail_with: None,
            keys: Mutex::new(HashMap::new()),
            payments: Mutex::new(HashMap::new()),
        }
    }

    /// Holds every create call until `parties` calls are in flight.
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Barrier::new(parties));
        self
    }

    pub fn failing(mut self, status: u16) -> Self {
        self.fail_with = Some(status);
        self
    }

    pub fn without_key_dedup(mut self) -> Self {
        self.dedup_by_key = false;
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn register_payment(&self, id: &str, status: PaymentStatus, external_reference: Option<&str>) {
        self.payments.lock().unwrap().insert(
            id.to_string(),
            GatewayPayment {
                id: id.to_string(),
                status,
                status_detail: None,
                external_reference: external_reference.map(str::to_string),
                metadata: json!({}),
            },
        );
    }

    pub fn set_status(&self, id: &str, status: PaymentStatus) {
        if let Some(payment) = self.payments.lock().unwrap().get_mut(id) {
            payment.status = status;
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn environment(&self) -> DeploymentEnvironment {
        DeploymentEnvironment::Test
    }

    fn public_key(&self) -> &str {
        "TEST-public-key"
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
        idempotency_key: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        if let Some(status) = self.fail_with {
            return Err(GatewayError::Api {
                status,
                body: r#"{"message":"invalid card token","status":400}"#.to_string(),
            });
        }

        if self.dedup_by_key {
            if let Some(id) = self.keys.lock().unwrap().get(idempotency_key) {
                return Ok(self.payments.lock().unwrap()[id].clone());
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let metadata = match request.method_details {
            MethodDetails::InstantTransfer => json!({
                "qr_code": format!("00020126PIX{}", id),
                "ticket_url": format!("https://gateway.test/ticket/{}", id),
            }),
            MethodDetails::Card { installments, .. } => json!({ "installments": installments }),
        };
        let payment = GatewayPayment {
            id: id.clone(),
            status: PaymentStatus::Pending,
            status_detail: Some("pending_waiting_transfer".to_string()),
            external_reference: Some(request.order_id.clone()),
            metadata,
        };

        self.payments.lock().unwrap().insert(id.clone(), payment.clone());
        if self.dedup_by_key {
            self.keys.lock().unwrap().insert(idempotency_key.to_string(), id);
        }

        Ok(payment)
    }

    async fn get_payment(&self, external_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| GatewayError::Api {
                status: 404,
                body: r#"{"message":"Payment not found"}"#.to_string(),
            })
    }

    async fn installment_options(
        &self,
        amount_cents: i64,
        _payment_method_id: &str,
        _issuer_id: Option<&str>,
    ) -> Result<Vec<InstallmentOption>, GatewayError> {
        Ok(vec![
            InstallmentOption {
                installments: 1,
                installment_rate: 0.0,
                installment_amount_cents: amount_cents,
                total_amount_cents: amount_cents,
                labels: vec![],
            },
            InstallmentOption {
                installments: 3,
                installment_rate: 0.0,
                installment_amount_cents: amount_cents / 3,
                total_amount_cents: amount_cents,
                labels: vec!["recommended_installment".to_string()],
            },
        ])
    }
}

/// Single shared connection so every query sees the same in-memory database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn test_context() -> anyhow::Result<ServiceContext> {
    test_context_with(Settings::default()).await
}

pub async fn test_context_with(settings: Settings) -> anyhow::Result<ServiceContext> {
    let pool = test_pool().await?;
    Ok(ServiceContext::sqlite(pool, &settings))
}

pub async fn seed_product(ctx: &ServiceContext, id: &str, stock: i64) -> anyhow::Result<Product> {
    Ok(ctx
        .inventory_repo
        .create_product(Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            price_cents: 2_500,
            stock,
        })
        .await?)
}

pub async fn seed_order(
    ctx: &ServiceContext,
    order_id: &str,
    items: &[(&str, i64)],
) -> anyhow::Result<Order> {
    let items: Vec<OrderItem> = items
        .iter()
        .map(|(product_id, quantity)| OrderItem {
            product_id: product_id.to_string(),
            quantity: *quantity,
            unit_price_cents: 2_500,
        })
        .collect();
    let total_amount_cents = items.iter().map(|i| i.quantity * i.unit_price_cents).sum();
    let now = Utc::now();

    Ok(ctx
        .order_repo
        .create(Order {
            id: order_id.to_string(),
            user_id: "user-1".to_string(),
            items,
            total_amount_cents,
            status: OrderStatus::Pending,
            payment_id: None,
            created_at: now,
            updated_at: now,
        })
        .await?)
}

pub fn order_data(order_id: &str, user_id: &str) -> OrderData {
    OrderData {
        order_id: order_id.to_string(),
        user_id: user_id.to_string(),
        items: vec![
            OrderItemData {
                product_id: "p-1".to_string(),
                quantity: 3,
                unit_price: 25.0,
            },
            OrderItemData {
                product_id: "p-2".to_string(),
                quantity: 1,
                unit_price: 25.0,
            },
        ],
        total_amount: 100.0,
        description: None,
        payer: Some(Payer {
            email: "buyer@example.com".to_string(),
            first_name: Some("Ana".to_string()),
            last_name: None,
            identification: None,
        }),
    }
}

pub fn gateway_arc(fake: &Arc<FakeGateway>) -> Arc<dyn PaymentGateway> {
    fake.clone()
}
