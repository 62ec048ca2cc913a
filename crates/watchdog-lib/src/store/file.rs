//! File-backed alert state store
//!
//! Persists the whole state map as a single JSON document so cooldowns
//! survive agent restarts. Writes go through a temp file and rename to
//! keep the document intact if the process dies mid-write.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::anomaly::AnomalyType;
use crate::clock::Clock;
use crate::models::AlertState;

use super::{expiry, AlertStateStore, StoreError, StoredAlert};

/// Durable store backed by a JSON file
pub struct FileStateStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<AnomalyType, StoredAlert>>,
}

impl FileStateStore {
    /// Open a store at `path`, loading any persisted state
    ///
    /// A missing file starts empty. An unreadable or unparsable file is an
    /// error: silently starting fresh would drop active cooldowns.
    pub async fn open(path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mut entries: HashMap<AnomalyType, StoredAlert> =
                    serde_json::from_slice(&bytes).map_err(|e| {
                        StoreError::Unavailable(format!("parse {}: {e}", path.display()))
                    })?;
                let now = clock.now();
                entries.retain(|_, entry| entry.expires_at > now);
                debug!(
                    path = %path.display(),
                    entries = entries.len(),
                    "Loaded alert state"
                );
                entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path,
            clock,
            entries: RwLock::new(entries),
        })
    }

    /// Write the full map to disk atomically
    async fn persist(&self, entries: &HashMap<AnomalyType, StoredAlert>) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(entries)
            .map_err(|e| StoreError::Unavailable(format!("serialize alert state: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Unavailable(format!("create {}: {e}", parent.display()))
                })?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", temp_path.display())))?;
        file.write_all(&data)
            .await
            .map_err(|e| StoreError::Unavailable(format!("write {}: {e}", temp_path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::Unavailable(format!("sync {}: {e}", temp_path.display())))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("rename {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl AlertStateStore for FileStateStore {
    async fn get(&self, anomaly_type: AnomalyType) -> Result<Option<AlertState>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(&anomaly_type)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.state.clone()))
    }

    async fn put(
        &self,
        anomaly_type: AnomalyType,
        state: AlertState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        // The write lock is held across the disk write so concurrent puts
        // cannot persist out of order.
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            anomaly_type,
            StoredAlert {
                state,
                expires_at: expiry(now, ttl),
            },
        );
        self.persist(&entries).await
    }

    async fn delete(&self, anomaly_type: AnomalyType) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if entries.remove(&anomaly_type).is_none() {
            return Ok(());
        }
        self.persist(&entries).await
    }

    /// Removes every listed type with a single disk write
    async fn delete_all(&self, anomaly_types: &[AnomalyType]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        for anomaly_type in anomaly_types {
            entries.remove(anomaly_type);
        }
        if entries.len() == before {
            return Ok(());
        }
        self.persist(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{DateTime, TimeZone, Utc};

    const TTL: Duration = Duration::from_secs(24 * 60 * 60);

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn state(alert_count: u32, at: DateTime<Utc>) -> AlertState {
        AlertState {
            last_alert_time: at,
            alert_count,
        }
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start_time()));

        let store = FileStateStore::open(dir.path().join("alert_state.json"), clock)
            .await
            .unwrap();

        assert!(store.get(AnomalyType::HighLatency).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        let clock = Arc::new(ManualClock::new(start_time()));

        let store = FileStateStore::open(path.clone(), clock.clone())
            .await
            .unwrap();
        store
            .put(AnomalyType::HighErrorRate, state(2, clock.now()), TTL)
            .await
            .unwrap();
        drop(store);

        let reopened = FileStateStore::open(path, Arc::new(ManualClock::new(start_time())))
            .await
            .unwrap();
        let loaded = reopened
            .get(AnomalyType::HighErrorRate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.alert_count, 2);
        assert_eq!(loaded.last_alert_time, start_time());
    }

    #[tokio::test]
    async fn test_expired_entries_pruned_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        let clock = Arc::new(ManualClock::new(start_time()));

        let store = FileStateStore::open(path.clone(), clock.clone())
            .await
            .unwrap();
        store
            .put(AnomalyType::TrafficSpike, state(1, clock.now()), TTL)
            .await
            .unwrap();
        drop(store);

        let later = Arc::new(ManualClock::new(start_time() + chrono::Duration::days(2)));
        let reopened = FileStateStore::open(path, later).await.unwrap();
        assert!(reopened
            .get(AnomalyType::TrafficSpike)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        std::fs::write(&path, "not json at all").unwrap();

        let result = FileStateStore::open(path, Arc::new(ManualClock::new(start_time()))).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        let clock = Arc::new(ManualClock::new(start_time()));

        let store = FileStateStore::open(path.clone(), clock.clone())
            .await
            .unwrap();
        store
            .put(AnomalyType::LlmLatency, state(1, clock.now()), TTL)
            .await
            .unwrap();
        store.delete(AnomalyType::LlmLatency).await.unwrap();
        drop(store);

        let reopened = FileStateStore::open(path, Arc::new(ManualClock::new(start_time())))
            .await
            .unwrap();
        assert!(reopened
            .get(AnomalyType::LlmLatency)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_all_persists_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        let clock = Arc::new(ManualClock::new(start_time()));

        let store = FileStateStore::open(path.clone(), clock.clone())
            .await
            .unwrap();
        store
            .put(AnomalyType::HighErrorRate, state(1, clock.now()), TTL)
            .await
            .unwrap();
        store
            .put(AnomalyType::LlmHighTokens, state(1, clock.now()), TTL)
            .await
            .unwrap();
        store.delete_all(&AnomalyType::ALL).await.unwrap();
        drop(store);

        let reopened = FileStateStore::open(path, Arc::new(ManualClock::new(start_time())))
            .await
            .unwrap();
        assert!(reopened
            .get(AnomalyType::HighErrorRate)
            .await
            .unwrap()
            .is_none());
        assert!(reopened
            .get(AnomalyType::LlmHighTokens)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        let clock = Arc::new(ManualClock::new(start_time()));

        let store = FileStateStore::open(path.clone(), clock.clone())
            .await
            .unwrap();
        store
            .put(AnomalyType::LlmHighTokens, state(1, clock.now()), TTL)
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
