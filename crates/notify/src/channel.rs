//! Builds the outbound channel for a tenant's messaging integration.

use std::collections::HashMap;
use std::time::Duration;

use oncall_core::config::NotifyConfig;
use oncall_core::MessagingIntegration;

use crate::slack::SlackNotifier;
use crate::traits::{Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Turns integration credentials into a ready-to-use channel.
pub trait ChannelFactory: Send + Sync {
    fn build(&self, integration: &MessagingIntegration) -> Result<Box<dyn Notifier>, NotifyError>;
}

/// Production factory: real HTTP clients for Slack and webhooks.
#[derive(Debug, Clone)]
pub struct HttpChannelFactory {
    slack_api_base: String,
    timeout: Duration,
}

impl HttpChannelFactory {
    pub fn new(slack_api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            slack_api_base: slack_api_base.into(),
            timeout,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.slack_api_base.clone(), Duration::from_secs(config.timeout_secs))
    }
}

impl ChannelFactory for HttpChannelFactory {
    fn build(&self, integration: &MessagingIntegration) -> Result<Box<dyn Notifier>, NotifyError> {
        match integration {
            MessagingIntegration::Slack { bot_token, channel_id } => Ok(Box::new(
                SlackNotifier::from_config(
                    bot_token.clone(),
                    channel_id.clone(),
                    &self.slack_api_base,
                    self.timeout,
                )?,
            )),
            MessagingIntegration::Webhook { url } => Ok(Box::new(WebhookNotifier::new(
                url,
                HashMap::new(),
                self.timeout,
            )?)),
        }
    }
}
