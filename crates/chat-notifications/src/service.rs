//! Notifier capability and in-process implementations

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::notification::MessageEvent;

/// Notifier errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifier is closed")]
    Closed,
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Outbound notification sink for created messages
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish a hydrated message event
    async fn publish(&self, event: MessageEvent) -> NotifyResult<()>;
}

/// Fans events out to every live subscriber
pub struct BroadcastNotifier {
    sender: broadcast::Sender<MessageEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn publish(&self, event: MessageEvent) -> NotifyResult<()> {
        let message_id = event.message_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(message_id, receivers, "Message event broadcast");
            }
            // Nobody listening is not a delivery failure
            Err(_) => {
                debug!(message_id, "Message event dropped, no subscribers");
            }
        }
        Ok(())
    }
}

/// Records published events; for tests and dry runs
#[derive(Default)]
pub struct MemoryNotifier {
    events: RwLock<Vec<MessageEvent>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<MessageEvent> {
        self.events.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn publish(&self, event: MessageEvent) -> NotifyResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_models::{Message, MessageType};

    fn event(id: i64) -> MessageEvent {
        MessageEvent::created(Message::new(id, 1, 1, MessageType::Attachment, "file.txt"))
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);

        notifier.publish(event(42)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message_id(), 42);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::default();
        assert!(notifier.publish(event(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_notifier_records() {
        let notifier = MemoryNotifier::new();
        assert!(notifier.is_empty().await);

        notifier.publish(event(1)).await.unwrap();
        notifier.publish(event(2)).await.unwrap();

        let events = notifier.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].message_id(), 2);
    }
}
