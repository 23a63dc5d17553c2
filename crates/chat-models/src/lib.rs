//! # chat-models
//!
//! Domain records shared by the attachment pipeline, the repositories and the
//! notifier. Each model implements the core traits from `chat-core`.

pub use chat_core::traits::{Id, Identifiable, SoftDeletable, Timestamped};

pub mod attachment;
pub mod message;
pub mod user;

pub use attachment::{Attachment, AttachmentMeta, Binding, FileMeta, ImageMeta, MessageAttachment};
pub use message::{Message, MessageType};
pub use user::User;
