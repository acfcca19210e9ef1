//! Chat-bot notification channel.
//!
//! [`ChatNotifier`] posts plain text to a bot API
//! (`{api_base}/bot{token}/sendMessage`). Each notification namespace may
//! have its own bot token; unknown namespaces use the default token.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use jobline_core::error::NotifyError;
use jobline_core::notify::Notifier;

/// Default bot API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// HTTP request timeout for a single notification.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Bot tokens per namespace plus transport settings.
#[derive(Debug, Clone)]
pub struct ChatNotifierConfig {
    pub api_base: String,
    pub default_token: Option<String>,
    /// Namespace → bot token.
    pub tokens: HashMap<String, String>,
    pub timeout: Duration,
}

impl Default for ChatNotifierConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            default_token: None,
            tokens: HashMap::new(),
            timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }
}

impl ChatNotifierConfig {
    /// Whether any channel at all can be reached.
    pub fn has_any_token(&self) -> bool {
        self.default_token.is_some() || !self.tokens.is_empty()
    }

    fn token_for(&self, channel: &str) -> Option<&str> {
        self.tokens
            .get(channel)
            .or(self.default_token.as_ref())
            .map(String::as_str)
    }
}

/// Delivers status text through a chat bot API.
pub struct ChatNotifier {
    client: reqwest::Client,
    config: ChatNotifierConfig,
}

impl ChatNotifier {
    pub fn new(config: ChatNotifierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ChatNotifierConfig {
        &self.config
    }
}

#[async_trait]
impl Notifier for ChatNotifier {
    async fn send(&self, channel: &str, recipient: &str, text: &str) -> Result<(), NotifyError> {
        let token = self
            .config
            .token_for(channel)
            .ok_or_else(|| NotifyError::NotConfigured(channel.to_string()))?;

        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            token
        );
        let body = serde_json::json!({
            "chat_id": recipient,
            "text": text,
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(channel, recipient, "Notification delivered");
        Ok(())
    }
}
