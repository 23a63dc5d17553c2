//! # chat-db
//!
//! PostgreSQL persistence for chat attachments.
//!
//! This crate provides PostgreSQL database access using SQLx, including:
//!
//! - Connection pool management and embedded migrations
//! - Transactional attachment and message repositories
//! - The user directory used to resolve message authors
//!
//! ## Example
//!
//! ```ignore
//! use chat_db::PgDatabase;
//!
//! let db = PgDatabase::connect(&url, &config.database).await?;
//! let users = db.users();
//! let service = AttachmentService::new(Arc::new(db), Arc::new(users), notifier, ids, config.preview);
//! ```

pub mod attachments;
pub mod messages;
pub mod pool;
pub mod repository;
pub mod users;

// Re-exports
pub use attachments::{AttachmentRow, MessageAttachmentRow, PgAttachmentRepository};
pub use messages::{MessageRow, PgMessageRepository};
pub use pool::{PgDatabase, PoolStats, MIGRATOR};
pub use repository::map_sqlx_error;
pub use users::{PgUserDirectory, UserRow};
