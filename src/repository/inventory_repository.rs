use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

use crate::{
    domain::Product,
    error::{AppError, Result},
    repository::InventoryRepository,
};

#[derive(FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price_cents: i64,
    stock: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            price_cents: row.price_cents,
            stock: row.stock,
        }
    }
}

pub struct SqliteInventoryRepository {
    pool: SqlitePool,
}

impl SqliteInventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryRepository for SqliteInventoryRepository {
    async fn create_product(&self, product: Product) -> Result<Product> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_product(&product.id)
            .await?
            .ok_or_else(|| AppError::Persistence("Failed to retrieve created product".to_string()))
    }

    async fn find_product(&self, id: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price_cents, stock FROM products WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn decrement_stock(&self, product_id: &str, quantity: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - ?, updated_at = ?
            WHERE id = ? AND stock >= ?
            "#,
        )
        .bind(quantity)
        .bind(Utc::now().naive_utc())
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
