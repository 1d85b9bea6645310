use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment::Payment;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    pub user_id: String,
    pub payment_id: Uuid,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn for_payment(key: &str, payment: &Payment, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            idempotency_key: key.to_string(),
            user_id: payment.user_id.clone(),
            payment_id: payment.id,
            external_id: payment.external_id.clone(),
            created_at: now,
            expires_at: now + ttl,
        }
    }
}
