//! In-memory alert state store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::anomaly::AnomalyType;
use crate::clock::Clock;
use crate::models::AlertState;

use super::{expiry, AlertStateStore, StoreError, StoredAlert};

/// Volatile store for single-process deployments
///
/// State is lost on restart, so after a restart each anomaly type may
/// notify once more before its cooldown re-arms. Expired entries are
/// pruned on write.
pub struct MemoryStateStore {
    entries: DashMap<AnomalyType, StoredAlert>,
    clock: Arc<dyn Clock>,
}

impl MemoryStateStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }
}

#[async_trait]
impl AlertStateStore for MemoryStateStore {
    async fn get(&self, anomaly_type: AnomalyType) -> Result<Option<AlertState>, StoreError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(&anomaly_type)
            .filter(|entry| entry.value().expires_at > now)
            .map(|entry| entry.value().state.clone()))
    }

    async fn put(
        &self,
        anomaly_type: AnomalyType,
        state: AlertState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.insert(
            anomaly_type,
            StoredAlert {
                state,
                expires_at: expiry(now, ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, anomaly_type: AnomalyType) -> Result<(), StoreError> {
        self.entries.remove(&anomaly_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    const TTL: Duration = Duration::from_secs(24 * 60 * 60);

    fn test_store() -> (MemoryStateStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        (MemoryStateStore::new(clock.clone()), clock)
    }

    fn state(alert_count: u32, clock: &ManualClock) -> AlertState {
        AlertState {
            last_alert_time: clock.now(),
            alert_count,
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (store, clock) = test_store();

        store
            .put(AnomalyType::HighLatency, state(1, &clock), TTL)
            .await
            .unwrap();

        let loaded = store.get(AnomalyType::HighLatency).await.unwrap().unwrap();
        assert_eq!(loaded.alert_count, 1);
        assert_eq!(loaded.last_alert_time, clock.now());
    }

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let (store, _clock) = test_store();
        assert!(store.get(AnomalyType::TrafficSpike).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_none() {
        let (store, clock) = test_store();

        store
            .put(AnomalyType::HighErrorRate, state(1, &clock), TTL)
            .await
            .unwrap();

        clock.advance(TTL);
        assert!(store
            .get(AnomalyType::HighErrorRate)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_put_restarts_ttl() {
        let (store, clock) = test_store();

        store
            .put(AnomalyType::LlmErrorRate, state(1, &clock), TTL)
            .await
            .unwrap();

        clock.advance(TTL - Duration::from_secs(60));
        store
            .put(AnomalyType::LlmErrorRate, state(2, &clock), TTL)
            .await
            .unwrap();

        // Past the original deadline but inside the refreshed one.
        clock.advance(Duration::from_secs(120));
        let loaded = store.get(AnomalyType::LlmErrorRate).await.unwrap().unwrap();
        assert_eq!(loaded.alert_count, 2);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let (store, clock) = test_store();

        store
            .put(AnomalyType::LlmHighTokens, state(3, &clock), TTL)
            .await
            .unwrap();
        store.delete(AnomalyType::LlmHighTokens).await.unwrap();

        assert!(store
            .get(AnomalyType::LlmHighTokens)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let (store, _clock) = test_store();
        assert!(store.delete(AnomalyType::LlmLatency).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_all_clears_listed_types() {
        let (store, clock) = test_store();

        store
            .put(AnomalyType::HighErrorRate, state(1, &clock), TTL)
            .await
            .unwrap();
        store
            .put(AnomalyType::LlmLatency, state(1, &clock), TTL)
            .await
            .unwrap();

        store.delete_all(&AnomalyType::ALL).await.unwrap();

        assert!(store
            .get(AnomalyType::HighErrorRate)
            .await
            .unwrap()
            .is_none());
        assert!(store.get(AnomalyType::LlmLatency).await.unwrap().is_none());
    }
}
