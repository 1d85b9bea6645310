use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentMethod, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    external_id: String,
    order_id: String,
    user_id: String,
    amount_cents: i64,
    method: String,
    status: String,
    metadata: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Persistence(e.to_string()))?,
            external_id: row.external_id,
            order_id: row.order_id,
            user_id: row.user_id,
            amount_cents: row.amount_cents,
            method: PaymentMethod::parse(&row.method).ok_or_else(|| {
                AppError::Persistence(format!("Invalid payment method: {}", row.method))
            })?,
            status: PaymentStatus::parse(&row.status).ok_or_else(|| {
                AppError::Persistence(format!("Invalid payment status: {}", row.status))
            })?,
            metadata: serde_json::from_str(&row.metadata)
                .map_err(|e| AppError::Persistence(format!("Invalid payment metadata: {}", e)))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, external_id, order_id, user_id, amount_cents,
           method, status, metadata, created_at, updated_at
    FROM payments
"#;

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, external_id, order_id, user_id, amount_cents,
                method, status, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO NOTHING
            "#,
        )
        .bind(payment.id.to_string())
        .bind(&payment.external_id)
        .bind(&payment.order_id)
        .bind(&payment.user_id)
        .bind(payment.amount_cents)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.metadata.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_external_id(&payment.external_id)
            .await?
            .ok_or_else(|| AppError::Persistence("Failed to retrieve created payment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{} WHERE id = ?", SELECT_PAYMENT))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "{} WHERE external_id = ?",
            SELECT_PAYMENT
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<Payment> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                metadata = COALESCE(?, metadata),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(metadata.map(|m| m.to_string()))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", id)))
    }
}
