//! Message model
//!
//! Table: messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::{Attachment, IMAGE_MIMETYPE_PREFIX};
use crate::user::User;
use crate::{Id, Identifiable, Timestamped};

/// Kind of conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    InlineImage,
    Attachment,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::InlineImage => "inline_image",
            Self::Attachment => "attachment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "inline_image" => Some(Self::InlineImage),
            "attachment" => Some(Self::Attachment),
            _ => None,
        }
    }

    /// Message type for an uploaded file with the given sniffed mimetype
    pub fn for_upload(mimetype: &str) -> Self {
        if mimetype.starts_with(IMAGE_MIMETYPE_PREFIX) {
            Self::InlineImage
        } else {
            Self::Attachment
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub channel_id: Id,
    pub user_id: Id,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Display text
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,

    /// Hydrated for outbound events only, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Message {
    pub fn new(
        id: Id,
        channel_id: Id,
        user_id: Id,
        message_type: MessageType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            channel_id,
            user_id,
            message_type,
            message: message.into(),
            created_at: None,
            attachment: None,
            user: None,
        }
    }
}

impl Identifiable for Message {
    fn id(&self) -> Id {
        self.id
    }
}

impl Timestamped for Message {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}
