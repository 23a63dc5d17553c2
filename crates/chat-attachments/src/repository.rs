//! Persistence capabilities
//!
//! Writes go through a backend transaction handle (`Tx`); reads run against
//! committed state.

use async_trait::async_trait;
use chat_core::traits::Id;
use chat_models::{Attachment, Binding, Message, MessageAttachment, User};

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Wrap a backend driver error
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database(Box::new(err))
    }

    pub fn not_found(entity: &str, id: Id) -> Self {
        Self::NotFound(format!("{} with id={}", entity, id))
    }
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Attachment rows and message bindings
#[async_trait]
pub trait AttachmentRepository<Tx: Send>: Send + Sync {
    /// Find a live (not soft-deleted) attachment
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Attachment>>;

    /// Attachments bound to any of the given messages
    async fn find_by_message_ids(
        &self,
        message_ids: &[Id],
    ) -> RepositoryResult<Vec<MessageAttachment>>;

    /// Insert an attachment; `created_at` is filled in when unset
    async fn create(&self, tx: &mut Tx, attachment: &mut Attachment) -> RepositoryResult<()>;

    /// Link an attachment to a message
    async fn bind(&self, tx: &mut Tx, attachment_id: Id, message_id: Id)
        -> RepositoryResult<Binding>;

    /// Soft delete
    async fn delete_by_id(&self, id: Id) -> RepositoryResult<()>;
}

/// Message rows
#[async_trait]
pub trait MessageRepository<Tx: Send>: Send + Sync {
    /// Insert a message; `created_at` is filled in when unset
    async fn create(&self, tx: &mut Tx, message: &mut Message) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Message>>;
}

/// Transactional backend owning the repositories
#[async_trait]
pub trait Database: Send + Sync {
    type Tx: Send;
    type Attachments: AttachmentRepository<Self::Tx>;
    type Messages: MessageRepository<Self::Tx>;

    async fn begin(&self) -> RepositoryResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> RepositoryResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> RepositoryResult<()>;

    fn attachments(&self) -> &Self::Attachments;

    fn messages(&self) -> &Self::Messages;
}

/// Resolves message authors
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with [`RepositoryError::NotFound`] for unknown users
    async fn find_by_id(&self, id: Id) -> RepositoryResult<User>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_database_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = RepositoryError::database(io);

        assert_eq!(err.to_string(), "Database error: reset by peer");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_found_message() {
        let err = RepositoryError::not_found("User", 12);
        assert_eq!(err.to_string(), "Entity not found: User with id=12");
    }
}
