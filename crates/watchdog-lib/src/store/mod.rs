//! Alert state persistence
//!
//! The store keeps one [`AlertState`] per anomaly type with a TTL; expired
//! entries read as misses. Implementations surface outages as
//! [`StoreError::Unavailable`] so deduplication can fail closed instead of
//! re-notifying on stale answers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anomaly::AnomalyType;
use crate::models::AlertState;

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

/// Errors surfaced by alert state stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be read or written
    #[error("alert state store unavailable: {0}")]
    Unavailable(String),
}

/// TTL'd key-value store of alert state, keyed by anomaly type
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// Fetch live state for one anomaly type
    async fn get(&self, anomaly_type: AnomalyType) -> Result<Option<AlertState>, StoreError>;

    /// Insert or replace state, restarting its TTL
    async fn put(
        &self,
        anomaly_type: AnomalyType,
        state: AlertState,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Remove state for one anomaly type; removing a missing key succeeds
    async fn delete(&self, anomaly_type: AnomalyType) -> Result<(), StoreError>;

    /// Remove state for every listed anomaly type
    async fn delete_all(&self, anomaly_types: &[AnomalyType]) -> Result<(), StoreError> {
        for anomaly_type in anomaly_types {
            self.delete(*anomaly_type).await?;
        }
        Ok(())
    }
}

/// A stored state plus its expiry deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredAlert {
    pub state: AlertState,
    pub expires_at: DateTime<Utc>,
}

/// Expiry deadline for a TTL starting now; out-of-range TTLs never expire
pub(crate) fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expiry_saturates_on_huge_ttl() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let deadline = expiry(now, Duration::from_secs(u64::MAX));
        assert_eq!(deadline, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_expiry_adds_ttl() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let deadline = expiry(now, Duration::from_secs(3600));
        assert_eq!(deadline, now + chrono::Duration::hours(1));
    }
}
