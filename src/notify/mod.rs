//! Fire-and-forget notification sink.
//!
//! Core logic writes messages onto an unbounded channel and moves on; a single
//! worker task delivers them to the external chat API. Delivery failures are
//! logged and swallowed so provisioning and reconciliation never block on, or
//! branch on, notification success.

use serde::Serialize;
use tokio::sync::mpsc;

/// One outbound message addressed by external chat id.
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub chat_id: i64,
    pub text: String,
}

/// Cheaply cloneable handle for queueing notifications.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Starts the delivery worker and returns the sending handle.
    ///
    /// The worker POSTs each message to the configured chat API endpoint
    /// (Telegram-style `sendMessage` body: chat id + text) and logs failures
    /// without retrying.
    ///
    /// # Arguments
    /// - `http_client` - Shared HTTP client
    /// - `api_url` - Full URL of the message-delivery endpoint
    pub fn start(http_client: reqwest::Client, api_url: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let result = http_client.post(&api_url).json(&notification).send().await;

                match result {
                    Ok(response) if !response.status().is_success() => {
                        tracing::warn!(
                            "Notification delivery to chat {} rejected: {}",
                            notification.chat_id,
                            response.status()
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Notification delivery to chat {} failed: {}",
                            notification.chat_id,
                            e
                        );
                    }
                    Ok(_) => {}
                }
            }
        });

        Self { tx }
    }

    /// Creates a handle with no worker attached, exposing the receiving end.
    ///
    /// Tests use this to assert on exactly which messages the core queued
    /// without any HTTP delivery in the loop.
    pub fn new_pair() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a message for delivery. Never blocks and never fails the caller.
    pub fn send(&self, chat_id: i64, text: impl Into<String>) {
        let notification = Notification {
            chat_id,
            text: text.into(),
        };

        if self.tx.send(notification).is_err() {
            tracing::warn!("Notification channel closed, message to chat {} dropped", chat_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_messages_arrive_in_order() {
        let (notifier, mut rx) = Notifier::new_pair();

        notifier.send(1, "first");
        notifier.send(2, "second");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();

        assert_eq!(first.chat_id, 1);
        assert_eq!(first.text, "first");
        assert_eq!(second.chat_id, 2);
        assert_eq!(second.text, "second");
    }

    #[tokio::test]
    async fn send_survives_closed_channel() {
        let (notifier, rx) = Notifier::new_pair();
        drop(rx);

        // Must not panic or error out.
        notifier.send(1, "into the void");
    }
}
