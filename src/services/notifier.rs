//! Bounded retry around a message sender.
//!
//! Retries use a fixed delay: the messaging provider either recovers within a
//! few seconds or the message is given up on and the next cycle moves on.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::NotifierConfig;
use crate::services::{MessageSender, NotificationService, Recipient};

/// `NotificationService` that retries a `MessageSender` a bounded number of times.
pub struct RetryingNotifier<S> {
    sender: S,
    /// Attempts including the first one
    max_attempts: u32,
    retry_delay: Duration,
}

impl<S: MessageSender> RetryingNotifier<S> {
    pub fn new(sender: S, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            sender,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(sender: S, config: &NotifierConfig) -> Self {
        Self::new(sender, config.max_attempts, config.retry_delay())
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }
}

#[async_trait]
impl<S: MessageSender> NotificationService for RetryingNotifier<S> {
    async fn send_to(&self, recipient: &Recipient, message: &str) {
        for attempt in 1..=self.max_attempts {
            match self.sender.deliver(recipient, message).await {
                Ok(()) => {
                    if attempt > 1 {
                        log::info!("Delivered to {recipient} on attempt {attempt}");
                    }
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    log::warn!(
                        "Delivery to {} failed (attempt {}/{}): {}",
                        recipient,
                        attempt,
                        self.max_attempts,
                        e
                    );
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => {
                    log::error!(
                        "Giving up on delivery to {} after {} attempts: {}",
                        recipient,
                        self.max_attempts,
                        e
                    );
                }
            }
        }
    }
}

/// Sender that only writes messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn deliver(&self, recipient: &Recipient, message: &str) -> Result<()> {
        log::info!("[dry-run] message to {recipient}:\n{message}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FlakySender;

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let notifier = RetryingNotifier::new(FlakySender::failing(2), 3, Duration::ZERO);

        notifier
            .send_to(&Recipient::Direct("5511900000001".into()), "hello")
            .await;

        assert_eq!(notifier.sender().attempts(), 3);
        assert_eq!(notifier.sender().delivered(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let notifier = RetryingNotifier::new(FlakySender::failing(10), 3, Duration::from_millis(1));

        notifier
            .send_to(&Recipient::Broadcast("group".into()), "hello")
            .await;

        assert_eq!(notifier.sender().attempts(), 3);
        assert!(notifier.sender().delivered().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let notifier = RetryingNotifier::new(FlakySender::failing(0), 0, Duration::ZERO);

        notifier
            .send_to(&Recipient::Direct("5511900000001".into()), "hi")
            .await;

        assert_eq!(notifier.sender().attempts(), 1);
    }
}
