use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod idempotency_repository;
pub mod inventory_repository;
pub mod order_repository;
pub mod payment_repository;

pub use idempotency_repository::SqliteIdempotencyRepository;
pub use inventory_repository::SqliteInventoryRepository;
pub use order_repository::SqliteOrderRepository;
pub use payment_repository::SqlitePaymentRepository;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts the payment. A payment already stored under the same gateway id
    /// is returned unchanged instead.
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Payment>>;
    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<Payment>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: Order) -> Result<Order>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>>;
    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>>;
    async fn attach_payment(&self, order_id: &str, payment_id: &str) -> Result<()>;
    /// Compare-and-set pending -> paid. Returns false when the order was not pending.
    async fn mark_paid(&self, order_id: &str, payment_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    async fn find_active(&self, key: &str, now: DateTime<Utc>) -> Result<Option<IdempotencyRecord>>;
    /// First writer wins: returns false when a live record already holds the key.
    async fn insert(&self, record: &IdempotencyRecord) -> Result<bool>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn create_product(&self, product: Product) -> Result<Product>;
    async fn find_product(&self, id: &str) -> Result<Option<Product>>;
    /// Atomic decrement-if-available. Returns false when stock was insufficient
    /// or the product does not exist.
    async fn decrement_stock(&self, product_id: &str, quantity: i64) -> Result<bool>;
}
