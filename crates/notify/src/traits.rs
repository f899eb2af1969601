//! Notifier trait definitions and shared error types.

use std::collections::HashMap;

use oncall_core::TransitionReason;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform rejected message: {0}")]
    Platform(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Lookup failed: {0}")]
    Lookup(#[from] oncall_core::StoreError),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// Short title (used by channels that support one).
    pub subject: String,
    /// The rendered message text.
    pub body: String,
    /// Additional metadata (rotation id, reason, assignee).
    pub metadata: HashMap<String, String>,
}

/// An outbound messaging channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "slack", "webhook").
    fn channel_name(&self) -> &str;

    /// Format a user mention the way this channel renders it, if it can.
    fn mention(&self, _mention_id: &str) -> Option<String> {
        None
    }

    /// Make user-supplied text safe to embed in a message for this channel.
    fn escape_text(&self, text: &str) -> String {
        text.to_string()
    }
}

/// What a single `notify_on_change` call ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Previous and new assignee are the same; nothing sent.
    Unchanged,
    /// The rotation no longer exists in the store.
    RotationMissing,
    /// The tenant has no messaging integration configured.
    NoIntegration,
    Delivered { channel: String },
    /// Delivery was attempted and failed. Logged, never retried.
    Failed { error: String },
}

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered { .. })
    }
}

/// Reacts to an observed change of effective assignee.
///
/// Delivery is at-least-once: callers that crash between notifying and
/// recording the new assignee will notify again on retry.
#[async_trait::async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify_on_change(
        &self,
        rotation_id: &str,
        previous: Option<&str>,
        new: Option<&str>,
        reason: TransitionReason,
    ) -> NotifyOutcome;
}
