//! Notification delivery
//!
//! Delivery is all-or-nothing per batch: either the push endpoint accepts
//! the notification or the batch fails and stays eligible for the next
//! pass. Senders must not drop anomalies silently.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::anomaly::Anomaly;

mod webhook;

pub use webhook::{NotificationPayload, WebhookConfig, WebhookNotifier};

/// Errors surfaced by notification senders
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request never produced a response
    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The push endpoint answered with a non-success status
    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    /// Callers must not send empty batches
    #[error("refusing to send an empty anomaly batch")]
    EmptyBatch,
}

/// Delivers anomaly batches to an external channel
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Send one nonempty batch as a single notification
    async fn send(&self, anomalies: &[Anomaly]) -> Result<(), NotifyError>;
}
