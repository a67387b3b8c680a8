use crate::domain::model::Response;
use crate::domain::ports::{DeliveryOutcome, ReplySink, ReplyTransport};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const DEFAULT_REPLY_ATTEMPTS: u32 = 5;
pub const DEFAULT_REPLY_RETRY: Duration = Duration::from_millis(100);
pub const DEFAULT_REPLY_PREFIX: &str = "reply_";

pub fn reply_channel_name(prefix: &str, requester_id: u32) -> String {
    format!("{}{}", prefix, requester_id)
}

#[derive(Debug, Clone)]
pub struct ReplySettings {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub prefix: String,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_REPLY_ATTEMPTS,
            retry_delay: DEFAULT_REPLY_RETRY,
            prefix: DEFAULT_REPLY_PREFIX.to_string(),
        }
    }
}

/// Fire-and-forget response delivery.
///
/// The requester may not have created its reply channel yet, so opening is
/// retried a bounded number of times. Anything that still fails is logged and
/// dropped; the caller never sees an error.
#[derive(Debug)]
pub struct ReplyChannelManager<T> {
    transport: T,
    settings: ReplySettings,
}

impl<T: ReplyTransport> ReplyChannelManager<T> {
    pub fn new(transport: T, settings: ReplySettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    async fn open_with_retry(&self, channel: &str) -> Option<T::Writer> {
        let attempts = self.settings.attempts.max(1);
        for attempt in 1..=attempts {
            match self.transport.open(channel).await {
                Ok(writer) => return Some(writer),
                Err(e) => {
                    tracing::debug!(
                        "Reply channel {} not ready (attempt {}/{}): {}",
                        channel,
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }
        None
    }
}

#[async_trait]
impl<T: ReplyTransport> ReplySink for ReplyChannelManager<T> {
    async fn send(&self, response: &Response) -> DeliveryOutcome {
        let channel = reply_channel_name(&self.settings.prefix, response.requester_id);

        let Some(mut writer) = self.open_with_retry(&channel).await else {
            tracing::warn!("Could not open reply channel {}, response dropped", channel);
            return DeliveryOutcome::Dropped;
        };

        let mut payload = Vec::with_capacity(response.text.len() + 1);
        payload.extend_from_slice(response.text.as_bytes());
        payload.push(b'\0');

        let written = async {
            writer.write_all(&payload).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                tracing::debug!("Replied on {}: {}", channel, response.text);
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!("Failed writing to reply channel {}: {}", channel, e);
                DeliveryOutcome::Dropped
            }
        }
    }
}
