//! Attachment Service
//!
//! Business logic for uploads: sniffing, storage, previews and the
//! transactional attachment/message/binding write.

use std::sync::Arc;

use chat_core::config::PreviewConfig;
use chat_core::traits::Id;
use chat_core::{ChatError, IdGenerator};
use chat_models::{Attachment, Message, MessageAttachment, MessageType};
use chat_notifications::{MessageEvent, Notifier};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::{debug, info, instrument, warn};

use crate::model::{extract_extension, CreateAttachmentParams, CreatedAttachment};
use crate::preview::PreviewGenerator;
use crate::repository::{
    AttachmentRepository, Database, MessageRepository, RepositoryError, UserDirectory,
};
use crate::sniff::sniff_mimetype;
use crate::storage::{ContentStore, ContentStream, StorageError};

/// Attachment service errors
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transaction failed: {0}")]
    Transaction(#[from] RepositoryError),

    #[error("Attachment not found: {0}")]
    NotFound(Id),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

impl From<AttachmentError> for ChatError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::NotFound(id) => ChatError::NotFound {
                entity: "Attachment",
                id,
            },
            AttachmentError::Configuration(msg) => ChatError::Internal(msg),
            AttachmentError::Io(e) => ChatError::Storage(e.to_string()),
            AttachmentError::Storage(e) => ChatError::Storage(e.to_string()),
            AttachmentError::Transaction(e) => ChatError::Database(e.to_string()),
        }
    }
}

/// Attachment service
pub struct AttachmentService<D: Database> {
    db: Arc<D>,
    store: Option<Arc<dyn ContentStore>>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
    previews: PreviewGenerator,
}

impl<D: Database> AttachmentService<D> {
    pub fn new(
        db: Arc<D>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
        preview: PreviewConfig,
    ) -> Self {
        Self {
            db,
            store: None,
            users,
            notifier,
            ids,
            previews: PreviewGenerator::new(preview),
        }
    }

    /// Set the content store used for originals and previews
    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn store(&self) -> AttachmentResult<&Arc<dyn ContentStore>> {
        self.store.as_ref().ok_or_else(|| {
            AttachmentError::Configuration(
                "Can not create attachment: content store not set".to_string(),
            )
        })
    }

    /// Create an attachment from an uploaded stream and post it to a channel.
    ///
    /// The original is stored before any row is written. Preview failures are
    /// reported in [`CreatedAttachment::preview`] and never fail the upload.
    /// The attachment, message and binding are written in one transaction;
    /// subscribers are notified only after it commits.
    #[instrument(skip(self, params, stream), fields(channel_id = params.channel_id, name = %params.name))]
    pub async fn create<R>(
        &self,
        params: CreateAttachmentParams,
        user_id: Id,
        stream: &mut R,
    ) -> AttachmentResult<CreatedAttachment>
    where
        R: AsyncRead + AsyncSeek + Send + Unpin,
    {
        let store = self.store()?;

        let mut attachment = Attachment::new(self.ids.next_id(), user_id, &params.name);
        attachment.meta.original.extension = extract_extension(&attachment.name);
        attachment.meta.original.size = params.size;
        attachment.meta.original.mimetype = sniff_mimetype(stream).await?;

        info!(
            id = attachment.id,
            name = %attachment.name,
            size = attachment.meta.original.size,
            mimetype = %attachment.meta.original.mimetype,
            "Processing uploaded file"
        );

        attachment.url = store.original_path(attachment.id, &attachment.meta.original.extension);
        let written = store.save(&attachment.url, &mut *stream).await?;
        if written != params.size as u64 {
            debug!(
                declared = params.size,
                written, "Declared upload size differs from stored size"
            );
        }

        let preview = self
            .previews
            .generate(store.as_ref(), &mut attachment, stream)
            .await;

        debug!(
            store = store.name(),
            url = %attachment.url,
            preview_url = %attachment.preview_url,
            "File stored"
        );

        let mut tx = self.db.begin().await?;
        let message = match self.persist(&mut tx, &params, &mut attachment).await {
            Ok(message) => {
                self.db.commit(tx).await?;
                message
            }
            Err(e) => {
                if let Err(rollback) = self.db.rollback(tx).await {
                    warn!(error = %rollback, "Rollback failed");
                }
                warn!(id = attachment.id, error = %e, "Attachment transaction rolled back");
                return Err(e.into());
            }
        };

        info!(
            id = attachment.id,
            message_id = message.id,
            "Attachment bound to message"
        );

        let message_id = message.id;
        self.notify(message).await;

        Ok(CreatedAttachment {
            attachment,
            message_id,
            preview,
        })
    }

    /// Transactional part of [`Self::create`]; returns the hydrated message
    async fn persist(
        &self,
        tx: &mut D::Tx,
        params: &CreateAttachmentParams,
        attachment: &mut Attachment,
    ) -> Result<Message, RepositoryError> {
        self.db.attachments().create(tx, attachment).await?;

        let mut message = Message::new(
            self.ids.next_id(),
            params.channel_id,
            attachment.user_id,
            MessageType::for_upload(&attachment.meta.original.mimetype),
            params.name.clone(),
        );
        self.db.messages().create(tx, &mut message).await?;

        self.db
            .attachments()
            .bind(tx, attachment.id, message.id)
            .await?;

        message.attachment = Some(attachment.clone());
        if message.user.is_none() {
            message.user = Some(self.users.find_by_id(message.user_id).await?);
        }

        Ok(message)
    }

    /// Publish a committed message; delivery failures are logged only
    async fn notify(&self, message: Message) {
        let message_id = message.id;
        if let Err(e) = self.notifier.publish(MessageEvent::created(message)).await {
            warn!(message_id, error = %e, "Could not publish message event");
        }
    }

    /// Get a live attachment by ID
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Id) -> AttachmentResult<Attachment> {
        self.db
            .attachments()
            .find_by_id(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))
    }

    /// Attachments bound to the given messages
    pub async fn find_by_message_ids(
        &self,
        message_ids: &[Id],
    ) -> AttachmentResult<Vec<MessageAttachment>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.attachments().find_by_message_ids(message_ids).await?)
    }

    /// Open the original blob; `None` when nothing was stored
    pub async fn open_original(
        &self,
        attachment: &Attachment,
    ) -> AttachmentResult<Option<Box<dyn ContentStream>>> {
        self.open(&attachment.url).await
    }

    /// Open the preview blob; `None` when the attachment has no preview
    pub async fn open_preview(
        &self,
        attachment: &Attachment,
    ) -> AttachmentResult<Option<Box<dyn ContentStream>>> {
        self.open(&attachment.preview_url).await
    }

    async fn open(&self, path: &str) -> AttachmentResult<Option<Box<dyn ContentStream>>> {
        if path.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.store()?.open(path).await?))
    }

    /// Soft delete an attachment; stored blobs are kept
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Id) -> AttachmentResult<()> {
        match self.db.attachments().delete_by_id(id).await {
            Ok(()) => {
                info!(id, "Attachment deleted");
                Ok(())
            }
            Err(RepositoryError::NotFound(_)) => Err(AttachmentError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}
