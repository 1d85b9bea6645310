pub mod idempotency;
pub mod payment_service;
pub mod rate_limiter;
pub mod webhook_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Settings;
use crate::payments::PaymentGateway;
use crate::repository::*;
use payment_service::PaymentService;
use rate_limiter::{RateLimiter, SlidingWindowRateLimiter};
use webhook_service::WebhookService;

pub use payment_service::{PaymentData, PaymentResult, StatusResult};
pub use webhook_service::{WebhookEvent, WebhookOutcome};

pub struct ServiceContext {
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub order_repo: Arc<dyn OrderRepository>,
    pub idempotency_repo: Arc<dyn IdempotencyRepository>,
    pub inventory_repo: Arc<dyn InventoryRepository>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub idempotency_ttl: chrono::Duration,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        order_repo: Arc<dyn OrderRepository>,
        idempotency_repo: Arc<dyn IdempotencyRepository>,
        inventory_repo: Arc<dyn InventoryRepository>,
        rate_limiter: Arc<dyn RateLimiter>,
        idempotency_ttl: chrono::Duration,
        db_pool: SqlitePool,
    ) -> Self {
        Self {
            payment_repo,
            order_repo,
            idempotency_repo,
            inventory_repo,
            rate_limiter,
            idempotency_ttl,
            db_pool,
        }
    }

    /// Wires the SQLite repositories and the in-process rate limiter.
    pub fn sqlite(db_pool: SqlitePool, settings: &Settings) -> Self {
        Self::new(
            Arc::new(SqlitePaymentRepository::new(db_pool.clone())),
            Arc::new(SqliteOrderRepository::new(db_pool.clone())),
            Arc::new(SqliteIdempotencyRepository::new(db_pool.clone())),
            Arc::new(SqliteInventoryRepository::new(db_pool.clone())),
            Arc::new(SlidingWindowRateLimiter::from_config(&settings.rate_limit)),
            chrono::Duration::hours(settings.idempotency.ttl_hours),
            db_pool,
        )
    }

    pub fn payment_service(&self, gateway: Arc<dyn PaymentGateway>) -> PaymentService {
        PaymentService::new(
            gateway,
            self.rate_limiter.clone(),
            self.payment_repo.clone(),
            self.order_repo.clone(),
            self.idempotency_repo.clone(),
            self.idempotency_ttl,
        )
    }

    pub fn webhook_service(&self, gateway: Arc<dyn PaymentGateway>) -> WebhookService {
        WebhookService::new(
            gateway,
            self.payment_repo.clone(),
            self.order_repo.clone(),
            self.inventory_repo.clone(),
        )
    }
}
