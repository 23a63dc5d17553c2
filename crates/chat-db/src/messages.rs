//! Messages repository
//!
//! Table: messages

use async_trait::async_trait;
use chat_attachments::{MessageRepository, RepositoryResult};
use chat_core::traits::Id;
use chat_models::{Message, MessageType};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::warn;

use crate::repository::map_sqlx_error;

/// Message row from database
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub rel_channel: i64,
    pub rel_user: i64,
    #[sqlx(rename = "type")]
    pub message_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        let message_type = MessageType::from_str(&row.message_type).unwrap_or_else(|| {
            warn!(id = row.id, message_type = %row.message_type, "Unknown message type");
            MessageType::default()
        });

        let mut message = Message::new(
            row.id,
            row.rel_channel,
            row.rel_user,
            message_type,
            row.message,
        );
        message.created_at = Some(row.created_at);
        message
    }
}

/// Message repository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository<Transaction<'static, Postgres>> for PgMessageRepository {
    async fn create(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        message: &mut Message,
    ) -> RepositoryResult<()> {
        let created_at = *message.created_at.get_or_insert_with(Utc::now);

        sqlx::query(
            r#"
            INSERT INTO messages (id, rel_channel, rel_user, type, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(message.channel_id)
        .bind(message.user_id)
        .bind(message.message_type.as_str())
        .bind(&message.message)
        .bind(created_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, rel_channel, rel_user, type, message, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Message::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(message_type: &str) -> MessageRow {
        MessageRow {
            id: 5,
            rel_channel: 2,
            rel_user: 9,
            message_type: message_type.to_string(),
            message: "cat.gif".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_into_message() {
        let message = Message::from(row("inline_image"));
        assert_eq!(message.id, 5);
        assert_eq!(message.channel_id, 2);
        assert_eq!(message.user_id, 9);
        assert_eq!(message.message_type, MessageType::InlineImage);
        assert!(message.created_at.is_some());
        assert!(message.attachment.is_none());
    }

    #[test]
    fn test_unknown_type_falls_back_to_text() {
        let message = Message::from(row("poll"));
        assert_eq!(message.message_type, MessageType::Text);
    }
}
