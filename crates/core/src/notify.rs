//! Outbound human-readable status notifications.

use async_trait::async_trait;

use crate::error::NotifyError;

/// Side-channel that delivers status text to a recipient on a namespaced
/// channel. Callers treat every failure as non-fatal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &str, recipient: &str, text: &str) -> Result<(), NotifyError>;
}

/// Notifier used when no outbound channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, channel: &str, _recipient: &str, _text: &str) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured(channel.to_string()))
    }
}
