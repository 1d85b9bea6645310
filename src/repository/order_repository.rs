use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::{
    domain::{Order, OrderItem, OrderStatus},
    error::{AppError, Result},
    repository::OrderRepository,
};

#[derive(FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    items: String,
    total_amount_cents: i64,
    status: String,
    payment_id: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: OrderRow) -> Result<Order> {
        let items: Vec<OrderItem> = serde_json::from_str(&row.items)
            .map_err(|e| AppError::Persistence(format!("Invalid order items for {}: {}", row.id, e)))?;

        Ok(Order {
            status: OrderStatus::parse(&row.status).ok_or_else(|| {
                AppError::Persistence(format!("Invalid order status: {}", row.status))
            })?,
            id: row.id,
            user_id: row.user_id,
            items,
            total_amount_cents: row.total_amount_cents,
            payment_id: row.payment_id,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn create(&self, order: Order) -> Result<Order> {
        let items = serde_json::to_string(&order.items)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, items, total_amount_cents, status,
                payment_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(items)
        .bind(order.total_amount_cents)
        .bind(order.status.as_str())
        .bind(&order.payment_id)
        .bind(order.created_at.naive_utc())
        .bind(order.updated_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_by_id(&order.id)
            .await?
            .ok_or_else(|| AppError::Persistence("Failed to retrieve created order".to_string()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total_amount_cents, status,
                   payment_id, created_at, updated_at
            FROM orders
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total_amount_cents, status,
                   payment_id, created_at, updated_at
            FROM orders
            WHERE payment_id = ?
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn attach_payment(&self, order_id: &str, payment_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_id = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(Utc::now().naive_utc())
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Pending order {} not found", order_id)));
        }

        Ok(())
    }

    async fn mark_paid(&self, order_id: &str, payment_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'paid', payment_id = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(Utc::now().naive_utc())
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
