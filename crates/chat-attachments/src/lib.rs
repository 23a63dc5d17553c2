//! # chat-attachments
//!
//! Attachment ingestion for chat messages.
//!
//! ## Features
//!
//! - Mimetype sniffing from leading bytes
//! - Image previews (EXIF orientation, animated GIF detection, downscaling)
//! - Content store abstraction (local filesystem, in-memory)
//! - Transactional attachment, message and binding writes followed by a
//!   message event
//!
//! ## Example
//!
//! ```rust,ignore
//! use chat_attachments::{AttachmentService, CreateAttachmentParams, LocalContentStore, MemoryDatabase};
//! use std::sync::Arc;
//!
//! let service = AttachmentService::new(db, users, notifier, ids, config.preview)
//!     .with_store(Arc::new(LocalContentStore::new("./var/store", "attachments")));
//!
//! let mut file = tokio::fs::File::open("cat.gif").await?;
//! let created = service
//!     .create(CreateAttachmentParams::new(channel_id, "cat.gif", size), user_id, &mut file)
//!     .await?;
//! ```

pub mod memory;
pub mod model;
pub mod preview;
pub mod repository;
pub mod service;
pub mod sniff;
pub mod storage;

pub use memory::{
    MemoryAttachmentRepository, MemoryDatabase, MemoryMessageRepository, MemoryTransaction,
    MemoryUserDirectory,
};
pub use model::{extract_extension, CreateAttachmentParams, CreatedAttachment};
pub use preview::{
    PreviewError, PreviewFormat, PreviewGenerator, PreviewOutcome, PreviewResult, SourceFormat,
};
pub use repository::{
    AttachmentRepository, Database, MessageRepository, RepositoryError, RepositoryResult,
    UserDirectory,
};
pub use service::{AttachmentError, AttachmentResult, AttachmentService};
pub use sniff::{detect_content_type, sniff_mimetype};
pub use storage::{
    ContentStore, ContentStream, LocalContentStore, MemoryContentStore, StorageError,
    StorageResult,
};
