//! Alert deduplication
//!
//! Suppresses repeat notifications of an anomaly type inside a cooldown
//! window. Cooldown bookkeeping lives in the alert state store, keyed by
//! anomaly type, so it can outlive the process when the store is durable.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::clock::Clock;
use crate::models::AlertState;
use crate::store::{AlertStateStore, StoreError};

use super::event::{Anomaly, AnomalyType};

/// Default cooldown between notifications of the same type (1 hour)
const DEFAULT_COOLDOWN_SECS: u64 = 60 * 60;

/// Default lifetime of idle alert state (24 hours)
const DEFAULT_STATE_TTL_SECS: u64 = 24 * 60 * 60;

/// Cooldown and retention settings for deduplication
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Minimum gap between notifications of the same anomaly type
    pub cooldown: Duration,
    /// Lifetime of alert state that is not being refreshed; must exceed
    /// the cooldown
    pub state_ttl: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            state_ttl: Duration::from_secs(DEFAULT_STATE_TTL_SECS),
        }
    }
}

/// Cooldown filter over the alert state store
#[derive(Clone)]
pub struct AlertDeduper {
    store: Arc<dyn AlertStateStore>,
    clock: Arc<dyn Clock>,
    cooldown: chrono::Duration,
    state_ttl: Duration,
}

impl AlertDeduper {
    /// Create a deduper over the given store and clock
    ///
    /// Fails when the TTL does not exceed the cooldown: state would expire
    /// while the cooldown it enforces was still running.
    pub fn new(
        store: Arc<dyn AlertStateStore>,
        clock: Arc<dyn Clock>,
        config: DedupConfig,
    ) -> Result<Self> {
        anyhow::ensure!(
            config.state_ttl > config.cooldown,
            "state TTL ({:?}) must exceed the cooldown ({:?})",
            config.state_ttl,
            config.cooldown
        );
        let cooldown =
            chrono::Duration::from_std(config.cooldown).context("cooldown out of range")?;

        Ok(Self {
            store,
            clock,
            cooldown,
            state_ttl: config.state_ttl,
        })
    }

    /// Drop anomalies whose type was notified within the cooldown
    ///
    /// Each distinct type is read from the store once, so one call sees a
    /// consistent view. Nothing is written: recording happens separately,
    /// after delivery succeeds.
    pub async fn filter_new_alerts(
        &self,
        anomalies: &[Anomaly],
    ) -> Result<Vec<Anomaly>, StoreError> {
        let now = self.clock.now();

        let mut states: HashMap<AnomalyType, Option<AlertState>> = HashMap::new();
        for anomaly in anomalies {
            if !states.contains_key(&anomaly.anomaly_type) {
                let state = self.store.get(anomaly.anomaly_type).await?;
                states.insert(anomaly.anomaly_type, state);
            }
        }

        let eligible: Vec<Anomaly> = anomalies
            .iter()
            .filter(|anomaly| match &states[&anomaly.anomaly_type] {
                Some(state) => now.signed_duration_since(state.last_alert_time) >= self.cooldown,
                None => true,
            })
            .cloned()
            .collect();

        if eligible.len() < anomalies.len() {
            debug!(
                suppressed = anomalies.len() - eligible.len(),
                "Suppressed anomalies inside cooldown"
            );
        }
        Ok(eligible)
    }

    /// Record that anomalies were successfully notified
    ///
    /// A batch counts once per anomaly type no matter how many anomalies
    /// of that type it carries.
    pub async fn record_alerts(&self, anomalies: &[Anomaly]) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut recorded: HashSet<AnomalyType> = HashSet::new();

        for anomaly in anomalies {
            if !recorded.insert(anomaly.anomaly_type) {
                continue;
            }
            let prior = self.store.get(anomaly.anomaly_type).await?;
            let alert_count = prior.map_or(1, |state| state.alert_count.saturating_add(1));
            self.store
                .put(
                    anomaly.anomaly_type,
                    AlertState {
                        last_alert_time: now,
                        alert_count,
                    },
                    self.state_ttl,
                )
                .await?;
            debug!(
                anomaly_type = %anomaly.anomaly_type,
                alert_count,
                "Recorded alert state"
            );
        }
        Ok(())
    }

    /// Current state for one anomaly type
    pub async fn state(&self, anomaly_type: AnomalyType) -> Result<Option<AlertState>, StoreError> {
        self.store.get(anomaly_type).await
    }

    /// All live alert state, in stable type order
    pub async fn states(&self) -> Result<Vec<(AnomalyType, AlertState)>, StoreError> {
        let mut out = Vec::new();
        for anomaly_type in AnomalyType::ALL {
            if let Some(state) = self.store.get(anomaly_type).await? {
                out.push((anomaly_type, state));
            }
        }
        Ok(out)
    }

    /// Drop all alert state, ending every active cooldown
    pub async fn clear_all_state(&self) -> Result<(), StoreError> {
        self.store.delete_all(&AnomalyType::ALL).await
    }

    /// Whether recorded state is still inside the cooldown window
    pub fn in_cooldown(&self, state: &AlertState) -> bool {
        self.clock.now().signed_duration_since(state.last_alert_time) < self.cooldown
    }
}
