use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::IdempotencyRecord,
    error::{AppError, Result},
    repository::IdempotencyRepository,
};

#[derive(FromRow)]
struct IdempotencyRow {
    idempotency_key: String,
    user_id: String,
    payment_id: String,
    external_id: String,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
}

pub struct SqliteIdempotencyRepository {
    pool: SqlitePool,
}

impl SqliteIdempotencyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: IdempotencyRow) -> Result<IdempotencyRecord> {
        Ok(IdempotencyRecord {
            idempotency_key: row.idempotency_key,
            user_id: row.user_id,
            payment_id: Uuid::parse_str(&row.payment_id)
                .map_err(|e| AppError::Persistence(e.to_string()))?,
            external_id: row.external_id,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            expires_at: DateTime::from_naive_utc_and_offset(row.expires_at, Utc),
        })
    }
}

#[async_trait]
impl IdempotencyRepository for SqliteIdempotencyRepository {
    async fn find_active(&self, key: &str, now: DateTime<Utc>) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query_as::<_, IdempotencyRow>(
            r#"
            SELECT idempotency_key, user_id, payment_id, external_id, created_at, expires_at
            FROM payment_idempotency
            WHERE idempotency_key = ? AND expires_at > ?
            "#,
        )
        .bind(key)
        .bind(now.naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn insert(&self, record: &IdempotencyRecord) -> Result<bool> {
        // The primary key decides the winner. An expired row for the same key
        // is overwritten; a live one is left untouched.
        let result = sqlx::query(
            r#"
            INSERT INTO payment_idempotency (
                idempotency_key, user_id, payment_id, external_id, created_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(idempotency_key) DO UPDATE SET
                user_id = excluded.user_id,
                payment_id = excluded.payment_id,
                external_id = excluded.external_id,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            WHERE payment_idempotency.expires_at <= excluded.created_at
            "#,
        )
        .bind(&record.idempotency_key)
        .bind(&record.user_id)
        .bind(record.payment_id.to_string())
        .bind(&record.external_id)
        .bind(record.created_at.naive_utc())
        .bind(record.expires_at.naive_utc())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::info!(
                idempotency_key = %record.idempotency_key,
                "Idempotency key already held by a live record"
            );
            return Ok(false);
        }

        Ok(true)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM payment_idempotency WHERE expires_at <= ?")
            .bind(now.naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
