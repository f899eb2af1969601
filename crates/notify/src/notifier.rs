//! Turns an observed assignee change into one outbound message.
//!
//! The guard against spurious messages lives here: when a transition fires
//! but resolves to the same person, nothing is sent. Everything after the
//! guard is best-effort; failures are logged and reported as an outcome,
//! never raised into the scheduling loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use oncall_core::{IntegrationStore, RotationStore, TransitionReason, UserDirectory};

use crate::channel::ChannelFactory;
use crate::templating::{HandoffContext, TemplateRenderer};
use crate::traits::{ChangeNotifier, Notification, Notifier, NotifyError, NotifyOutcome};

/// Placeholder used when nobody is on call.
pub const UNASSIGNED: &str = "Unassigned";

/// Notifier backed by the rotation store, the tenant's messaging
/// integration and the user directory.
pub struct RotationNotifier {
    rotations: Arc<dyn RotationStore>,
    integrations: Arc<dyn IntegrationStore>,
    directory: Arc<dyn UserDirectory>,
    channels: Arc<dyn ChannelFactory>,
    renderer: TemplateRenderer,
}

impl RotationNotifier {
    pub fn new(
        rotations: Arc<dyn RotationStore>,
        integrations: Arc<dyn IntegrationStore>,
        directory: Arc<dyn UserDirectory>,
        channels: Arc<dyn ChannelFactory>,
    ) -> Self {
        Self {
            rotations,
            integrations,
            directory,
            channels,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Replace the default message template.
    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    async fn deliver(
        &self,
        rotation_id: &str,
        previous: Option<&str>,
        new: Option<&str>,
        reason: TransitionReason,
    ) -> Result<NotifyOutcome, NotifyError> {
        let Some(rotation) = self.rotations.get_rotation(rotation_id).await? else {
            tracing::info!(rotation_id, "rotation gone, skipping notification");
            return Ok(NotifyOutcome::RotationMissing);
        };

        let Some(integration) = self.integrations.get_integration(&rotation.tenant_id).await? else {
            tracing::info!(
                rotation_id,
                tenant_id = %rotation.tenant_id,
                "no messaging integration configured, skipping notification"
            );
            return Ok(NotifyOutcome::NoIntegration);
        };

        let channel = self.channels.build(&integration)?;

        let ctx = HandoffContext {
            rotation: channel.escape_text(&rotation.name),
            rotation_id: rotation.rotation_id.clone(),
            assignee: self.describe(channel.as_ref(), new).await,
            reason: reason.phrase().to_string(),
            reason_code: reason.as_str().to_string(),
            previous: self.describe(channel.as_ref(), previous).await,
            now: Utc::now().to_rfc3339(),
        };
        let body = self.renderer.render(&ctx)?;

        let mut metadata = HashMap::from([
            ("rotation_id".to_string(), rotation.rotation_id.clone()),
            ("tenant_id".to_string(), rotation.tenant_id.clone()),
            ("reason".to_string(), reason.as_str().to_string()),
        ]);
        if let Some(new) = new {
            metadata.insert("assignee_id".to_string(), new.to_string());
        }
        if let Some(previous) = previous {
            metadata.insert("previous_assignee_id".to_string(), previous.to_string());
        }

        let notification = Notification {
            subject: format!("On-call change: {}", rotation.name),
            body,
            metadata,
        };

        channel.send(&notification).await?;
        Ok(NotifyOutcome::Delivered {
            channel: channel.channel_name().to_string(),
        })
    }

    /// Mention if the user linked one, else display name, else the raw id.
    async fn describe(&self, channel: &dyn Notifier, user_id: Option<&str>) -> String {
        let Some(user_id) = user_id else {
            return UNASSIGNED.to_string();
        };

        match self.directory.resolve_identity(user_id).await {
            Ok(Some(identity)) => identity
                .mention_id
                .as_deref()
                .and_then(|id| channel.mention(id))
                .unwrap_or_else(|| channel.escape_text(&identity.display_name)),
            Ok(None) => channel.escape_text(user_id),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "identity lookup failed, using raw id");
                channel.escape_text(user_id)
            }
        }
    }
}

#[async_trait]
impl ChangeNotifier for RotationNotifier {
    async fn notify_on_change(
        &self,
        rotation_id: &str,
        previous: Option<&str>,
        new: Option<&str>,
        reason: TransitionReason,
    ) -> NotifyOutcome {
        if previous == new {
            return NotifyOutcome::Unchanged;
        }

        match self.deliver(rotation_id, previous, new, reason).await {
            Ok(outcome) => {
                if let NotifyOutcome::Delivered { channel } = &outcome {
                    tracing::info!(
                        rotation_id,
                        channel = %channel,
                        reason = %reason,
                        previous = previous.unwrap_or("-"),
                        new = new.unwrap_or("-"),
                        "on-call change notification delivered"
                    );
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(rotation_id, reason = %reason, error = %e, "on-call change notification failed");
                NotifyOutcome::Failed { error: e.to_string() }
            }
        }
    }
}
