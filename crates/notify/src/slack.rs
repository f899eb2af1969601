//! Slack Web API notifier.
//!
//! Delivers notifications via `chat.postMessage` using a bot token.
//! Handles rate limiting and Slack's `{"ok": false, "error": ...}` replies.

use std::time::Duration;

use crate::traits::{Notification, Notifier, NotifyError};

/// Escapes the three characters Slack's mrkdwn treats as control sequences.
///
/// Only user-supplied text should go through this; mentions such as
/// `<@U123>` must stay unescaped.
pub fn escape_mrkdwn(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(ch),
        }
    }
    result
}

/// Sends notifications to one Slack channel.
#[derive(Debug)]
pub struct SlackNotifier {
    bot_token: String,
    channel_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// Creates a new `SlackNotifier` from integration values.
    ///
    /// If `bot_token` starts with `${`, the value between `${` and `}` is
    /// resolved as an environment variable name. Returns
    /// [`NotifyError::Config`] if the token is empty or the env var is missing.
    pub fn from_config(
        bot_token: String,
        channel_id: String,
        api_base: &str,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let resolved_token = if bot_token.starts_with("${") {
            let var_name = bot_token
                .strip_prefix("${")
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(|| {
                    NotifyError::Config(format!("Malformed env var reference: {bot_token}"))
                })?;
            std::env::var(var_name).map_err(|_| {
                NotifyError::Config(format!("Environment variable '{var_name}' is not set"))
            })?
        } else {
            bot_token
        };

        if resolved_token.is_empty() {
            return Err(NotifyError::Config("Slack bot token must not be empty".to_string()));
        }
        if channel_id.is_empty() {
            return Err(NotifyError::Config("Slack channel id must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            bot_token: resolved_token,
            channel_id,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let url = format!("{}/chat.postMessage", self.api_base);

        let body = serde_json::json!({
            "channel": self.channel_id,
            "text": notification.body,
            "mrkdwn": true,
        });

        tracing::debug!(channel_id = %self.channel_id, "Sending Slack notification");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited { retry_after_secs: retry_after });
        }

        let resp_body: serde_json::Value = response.json().await?;

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::info!(channel_id = %self.channel_id, "Slack notification sent");
            return Ok(());
        }

        let description = resp_body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown Slack API error");

        Err(NotifyError::Platform(format!("Slack API error ({status}): {description}")))
    }

    fn channel_name(&self) -> &str {
        "slack"
    }

    fn mention(&self, mention_id: &str) -> Option<String> {
        Some(format!("<@{mention_id}>"))
    }

    fn escape_text(&self, text: &str) -> String {
        escape_mrkdwn(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(token: &str) -> Result<SlackNotifier, NotifyError> {
        SlackNotifier::from_config(
            token.to_string(),
            "C0123".to_string(),
            "https://slack.test/api/",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn escape_mrkdwn_control_chars() {
        assert_eq!(escape_mrkdwn("R&D <core> team"), "R&amp;D &lt;core&gt; team");
    }

    #[test]
    fn escape_mrkdwn_plain_text_untouched() {
        assert_eq!(escape_mrkdwn("Platform *Primary*"), "Platform *Primary*");
        assert_eq!(escape_mrkdwn(""), "");
    }

    #[test]
    fn test_env_var_resolution() {
        std::env::set_var("TEST_SLACK_BOT_TOKEN", "xoxb-abc");
        let notifier = build("${TEST_SLACK_BOT_TOKEN}").expect("should resolve env var");
        assert_eq!(notifier.bot_token, "xoxb-abc");
        assert_eq!(notifier.api_base, "https://slack.test/api");
        std::env::remove_var("TEST_SLACK_BOT_TOKEN");
    }

    #[test]
    fn test_env_var_missing() {
        let err = build("${NONEXISTENT_VAR_SLACK_XYZ}").unwrap_err().to_string();
        assert!(err.contains("NONEXISTENT_VAR_SLACK_XYZ"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = build("").unwrap_err().to_string();
        assert!(err.contains("must not be empty"));
    }

    #[test]
    fn mention_uses_slack_syntax() {
        let notifier = build("xoxb-1").unwrap();
        assert_eq!(notifier.mention("U999").as_deref(), Some("<@U999>"));
        assert_eq!(notifier.channel_name(), "slack");
    }
}
