//! On-call handoff notifications.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable outbound channels (Slack, webhook)
//! - Minijinja rendering of the handoff message
//! - `RotationNotifier`, which decides whether an assignee change is worth
//!   a message and delivers it through the tenant's integration

pub mod channel;
pub mod notifier;
pub mod slack;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use channel::{ChannelFactory, HttpChannelFactory};
pub use notifier::RotationNotifier;
pub use traits::{ChangeNotifier, Notification, Notifier, NotifyError, NotifyOutcome};
