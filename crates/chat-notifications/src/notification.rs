//! Message event model

use chrono::{DateTime, Utc};
use chat_core::traits::Id;
use chat_models::Message;
use serde::{Deserialize, Serialize};

/// What happened to the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageCreated,
}

/// Event handed to subscribers; carries the fully hydrated message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub kind: EventKind,
    pub message: Message,
    pub timestamp: DateTime<Utc>,
}

impl MessageEvent {
    pub fn created(message: Message) -> Self {
        Self {
            kind: EventKind::MessageCreated,
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn channel_id(&self) -> Id {
        self.message.channel_id
    }

    pub fn message_id(&self) -> Id {
        self.message.id
    }

    /// Attachment id when the message was created by an upload
    pub fn attachment_id(&self) -> Option<Id> {
        self.message.attachment.as_ref().map(|a| a.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_models::{Attachment, MessageType};

    #[test]
    fn test_event_accessors() {
        let mut message = Message::new(10, 20, 30, MessageType::InlineImage, "cat.png");
        message.attachment = Some(Attachment::new(5, 30, "cat.png"));

        let event = MessageEvent::created(message);
        assert_eq!(event.kind, EventKind::MessageCreated);
        assert_eq!(event.channel_id(), 20);
        assert_eq!(event.message_id(), 10);
        assert_eq!(event.attachment_id(), Some(5));
    }

    #[test]
    fn test_event_serializes_kind() {
        let message = Message::new(1, 2, 3, MessageType::Attachment, "a.pdf");
        let json = serde_json::to_value(MessageEvent::created(message)).unwrap();
        assert_eq!(json["kind"], "message_created");
        assert_eq!(json["message"]["type"], "attachment");
    }
}
