//! In-memory backends
//!
//! Writes are staged on a [`MemoryTransaction`] and become visible only on
//! commit, so rollback behaves like a real database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::traits::Id;
use chat_models::{Attachment, Binding, Message, MessageAttachment, User};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::repository::{
    AttachmentRepository, Database, MessageRepository, RepositoryError, RepositoryResult,
    UserDirectory,
};

#[derive(Debug, Default)]
struct MemoryState {
    attachments: HashMap<Id, Attachment>,
    messages: HashMap<Id, Message>,
    bindings: Vec<Binding>,
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Attachment(Attachment),
    Message(Message),
    Binding(Binding),
}

/// Pending writes of one unit of work
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u64,
    writes: Vec<StagedWrite>,
}

impl MemoryTransaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn has_attachment(&self, id: Id) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w, StagedWrite::Attachment(a) if a.id == id))
    }

    fn has_message(&self, id: Id) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w, StagedWrite::Message(m) if m.id == id))
    }
}

/// Attachment repository over shared in-memory state
#[derive(Clone)]
pub struct MemoryAttachmentRepository {
    state: Arc<RwLock<MemoryState>>,
}

#[async_trait]
impl AttachmentRepository<MemoryTransaction> for MemoryAttachmentRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Attachment>> {
        let state = self.state.read().await;
        Ok(state
            .attachments
            .get(&id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_message_ids(
        &self,
        message_ids: &[Id],
    ) -> RepositoryResult<Vec<MessageAttachment>> {
        let state = self.state.read().await;
        Ok(state
            .bindings
            .iter()
            .filter(|b| message_ids.contains(&b.message_id))
            .filter_map(|b| {
                state
                    .attachments
                    .get(&b.attachment_id)
                    .filter(|a| a.deleted_at.is_none())
                    .map(|a| MessageAttachment {
                        message_id: b.message_id,
                        attachment: a.clone(),
                    })
            })
            .collect())
    }

    async fn create(
        &self,
        tx: &mut MemoryTransaction,
        attachment: &mut Attachment,
    ) -> RepositoryResult<()> {
        let exists = self.state.read().await.attachments.contains_key(&attachment.id);
        if exists || tx.has_attachment(attachment.id) {
            return Err(RepositoryError::Conflict(format!(
                "attachment {} already exists",
                attachment.id
            )));
        }

        if attachment.created_at.is_none() {
            attachment.created_at = Some(Utc::now());
        }

        tx.writes.push(StagedWrite::Attachment(attachment.clone()));
        Ok(())
    }

    async fn bind(
        &self,
        tx: &mut MemoryTransaction,
        attachment_id: Id,
        message_id: Id,
    ) -> RepositoryResult<Binding> {
        let state = self.state.read().await;

        if !(state.attachments.contains_key(&attachment_id) || tx.has_attachment(attachment_id)) {
            return Err(RepositoryError::not_found("Attachment", attachment_id));
        }
        if !(state.messages.contains_key(&message_id) || tx.has_message(message_id)) {
            return Err(RepositoryError::not_found("Message", message_id));
        }

        let binding = Binding {
            attachment_id,
            message_id,
        };
        tx.writes.push(StagedWrite::Binding(binding));
        Ok(binding)
    }

    async fn delete_by_id(&self, id: Id) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let attachment = state
            .attachments
            .get_mut(&id)
            .filter(|a| a.deleted_at.is_none())
            .ok_or_else(|| RepositoryError::not_found("Attachment", id))?;

        let now = Utc::now();
        attachment.deleted_at = Some(now);
        attachment.updated_at = Some(now);
        Ok(())
    }
}

/// Message repository over shared in-memory state
#[derive(Clone)]
pub struct MemoryMessageRepository {
    state: Arc<RwLock<MemoryState>>,
}

#[async_trait]
impl MessageRepository<MemoryTransaction> for MemoryMessageRepository {
    async fn create(&self, tx: &mut MemoryTransaction, message: &mut Message) -> RepositoryResult<()> {
        let exists = self.state.read().await.messages.contains_key(&message.id);
        if exists || tx.has_message(message.id) {
            return Err(RepositoryError::Conflict(format!(
                "message {} already exists",
                message.id
            )));
        }

        if message.created_at.is_none() {
            message.created_at = Some(Utc::now());
        }

        // hydrated fields are never persisted
        let mut row = message.clone();
        row.attachment = None;
        row.user = None;

        tx.writes.push(StagedWrite::Message(row));
        Ok(())
    }

    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Message>> {
        let state = self.state.read().await;
        Ok(state.messages.get(&id).cloned())
    }
}

/// In-memory transactional database
#[derive(Clone)]
pub struct MemoryDatabase {
    state: Arc<RwLock<MemoryState>>,
    attachments: MemoryAttachmentRepository,
    messages: MemoryMessageRepository,
    next_tx: Arc<AtomicU64>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        let state = Arc::new(RwLock::new(MemoryState::default()));
        Self {
            attachments: MemoryAttachmentRepository {
                state: state.clone(),
            },
            messages: MemoryMessageRepository {
                state: state.clone(),
            },
            state,
            next_tx: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Committed attachments, including soft-deleted ones
    pub async fn attachment_count(&self) -> usize {
        self.state.read().await.attachments.len()
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }

    pub async fn bindings(&self) -> Vec<Binding> {
        self.state.read().await.bindings.clone()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Tx = MemoryTransaction;
    type Attachments = MemoryAttachmentRepository;
    type Messages = MemoryMessageRepository;

    async fn begin(&self) -> RepositoryResult<MemoryTransaction> {
        Ok(MemoryTransaction {
            id: self.next_tx.fetch_add(1, Ordering::SeqCst),
            writes: Vec::new(),
        })
    }

    async fn commit(&self, tx: MemoryTransaction) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let writes = tx.writes.len();

        for write in tx.writes {
            match write {
                StagedWrite::Attachment(a) => {
                    state.attachments.insert(a.id, a);
                }
                StagedWrite::Message(m) => {
                    state.messages.insert(m.id, m);
                }
                StagedWrite::Binding(b) => state.bindings.push(b),
            }
        }

        debug!(tx = tx.id, writes, "Memory transaction committed");
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTransaction) -> RepositoryResult<()> {
        debug!(
            tx = tx.id,
            discarded = tx.writes.len(),
            "Memory transaction rolled back"
        );
        Ok(())
    }

    fn attachments(&self) -> &MemoryAttachmentRepository {
        &self.attachments
    }

    fn messages(&self) -> &MemoryMessageRepository {
        &self.messages
    }
}

/// User directory backed by a map
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Id, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("User", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_models::MessageType;

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();

        let mut attachment = Attachment::new(1, 10, "a.txt");
        let mut message = Message::new(2, 5, 10, MessageType::Attachment, "a.txt");
        db.attachments().create(&mut tx, &mut attachment).await.unwrap();
        db.messages().create(&mut tx, &mut message).await.unwrap();
        db.attachments().bind(&mut tx, 1, 2).await.unwrap();

        assert!(attachment.created_at.is_some());
        assert!(db.attachments().find_by_id(1).await.unwrap().is_none());

        db.commit(tx).await.unwrap();

        let stored = db.attachments().find_by_id(1).await.unwrap().unwrap();
        assert_eq!(stored, attachment);
        assert!(db.messages().find_by_id(2).await.unwrap().is_some());
        assert_eq!(db.bindings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();

        let mut attachment = Attachment::new(1, 10, "a.txt");
        db.attachments().create(&mut tx, &mut attachment).await.unwrap();
        db.rollback(tx).await.unwrap();

        assert_eq!(db.attachment_count().await, 0);
        assert!(db.bindings().await.is_empty());
    }

    #[tokio::test]
    async fn test_bind_requires_both_rows() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();

        let mut attachment = Attachment::new(1, 10, "a.txt");
        db.attachments().create(&mut tx, &mut attachment).await.unwrap();

        let result = db.attachments().bind(&mut tx, 1, 99).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();

        let mut first = Attachment::new(1, 10, "a.txt");
        let mut second = Attachment::new(1, 10, "b.txt");
        db.attachments().create(&mut tx, &mut first).await.unwrap();

        let result = db.attachments().create(&mut tx, &mut second).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_attachment() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let mut attachment = Attachment::new(1, 10, "a.txt");
        let mut message = Message::new(2, 5, 10, MessageType::Attachment, "a.txt");
        db.attachments().create(&mut tx, &mut attachment).await.unwrap();
        db.messages().create(&mut tx, &mut message).await.unwrap();
        db.attachments().bind(&mut tx, 1, 2).await.unwrap();
        db.commit(tx).await.unwrap();

        assert_eq!(db.attachments().find_by_message_ids(&[2]).await.unwrap().len(), 1);

        db.attachments().delete_by_id(1).await.unwrap();

        assert!(db.attachments().find_by_id(1).await.unwrap().is_none());
        assert!(db.attachments().find_by_message_ids(&[2]).await.unwrap().is_empty());
        // tombstone row is kept
        assert_eq!(db.attachment_count().await, 1);

        let again = db.attachments().delete_by_id(1).await;
        assert!(matches!(again, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_user_directory() {
        let users = MemoryUserDirectory::with_users([User::new(1, "alice")]);
        assert_eq!(users.find_by_id(1).await.unwrap().username, "alice");

        let missing = users.find_by_id(2).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));

        users.insert(User::new(2, "bob")).await;
        assert!(users.find_by_id(2).await.is_ok());
    }
}
