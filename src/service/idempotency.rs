use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::repository::IdempotencyRepository;

pub const DEFAULT_KEY_BUCKET: Duration = Duration::from_secs(60);

/// Derives the key checkout clients send in `x-idempotency-key`.
///
/// Identical submissions from the same user inside one time bucket collide
/// on purpose; once the bucket rolls over the same payload is a new intent.
/// `serde_json` keeps object keys sorted, so the payload text is canonical.
pub fn derive_idempotency_key(
    user_id: &str,
    payload: &serde_json::Value,
    now: DateTime<Utc>,
    bucket: Duration,
) -> String {
    let bucket_secs = bucket.as_secs().max(1) as i64;
    let bucket_index = now.timestamp().div_euclid(bucket_secs);

    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(payload.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(bucket_index.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Periodically deletes idempotency records whose retention window has passed.
pub fn spawn_retention_task(
    repo: Arc<dyn IdempotencyRepository>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            match repo.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!("Purged {} expired idempotency records", purged),
                Err(e) => tracing::error!("Failed to purge idempotency records: {}", e),
            }
        }
    })
}
