//! Attachments repository
//!
//! Tables: attachments, message_attachment

use async_trait::async_trait;
use chat_attachments::{AttachmentRepository, RepositoryError, RepositoryResult};
use chat_core::traits::Id;
use chat_models::{Attachment, AttachmentMeta, Binding, MessageAttachment};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::repository::map_sqlx_error;

/// Attachment row from database
#[derive(Debug, Clone, FromRow)]
pub struct AttachmentRow {
    pub id: i64,
    pub rel_user: i64,
    pub url: String,
    pub preview_url: String,
    pub name: String,
    pub meta: Json<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.rel_user,
            url: row.url,
            preview_url: row.preview_url,
            name: row.name,
            meta: row.meta.0,
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Attachment joined with its binding
#[derive(Debug, Clone, FromRow)]
pub struct MessageAttachmentRow {
    pub rel_message: i64,
    #[sqlx(flatten)]
    pub attachment: AttachmentRow,
}

impl From<MessageAttachmentRow> for MessageAttachment {
    fn from(row: MessageAttachmentRow) -> Self {
        Self {
            message_id: row.rel_message,
            attachment: row.attachment.into(),
        }
    }
}

/// Attachment repository
#[derive(Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository<Transaction<'static, Postgres>> for PgAttachmentRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Attachment>> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, rel_user, url, preview_url, name, meta,
                   created_at, updated_at, deleted_at
            FROM attachments
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Attachment::from))
    }

    async fn find_by_message_ids(
        &self,
        message_ids: &[Id],
    ) -> RepositoryResult<Vec<MessageAttachment>> {
        let rows = sqlx::query_as::<_, MessageAttachmentRow>(
            r#"
            SELECT ma.rel_message,
                   a.id, a.rel_user, a.url, a.preview_url, a.name, a.meta,
                   a.created_at, a.updated_at, a.deleted_at
            FROM attachments AS a
            INNER JOIN message_attachment AS ma ON a.id = ma.rel_attachment
            WHERE ma.rel_message = ANY($1) AND a.deleted_at IS NULL
            ORDER BY ma.rel_message
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MessageAttachment::from).collect())
    }

    async fn create(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        attachment: &mut Attachment,
    ) -> RepositoryResult<()> {
        let created_at = *attachment.created_at.get_or_insert_with(Utc::now);

        sqlx::query(
            r#"
            INSERT INTO attachments (id, rel_user, url, preview_url, name, meta, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(attachment.id)
        .bind(attachment.user_id)
        .bind(&attachment.url)
        .bind(&attachment.preview_url)
        .bind(&attachment.name)
        .bind(Json(&attachment.meta))
        .bind(created_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn bind(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        attachment_id: Id,
        message_id: Id,
    ) -> RepositoryResult<Binding> {
        sqlx::query("INSERT INTO message_attachment (rel_attachment, rel_message) VALUES ($1, $2)")
            .bind(attachment_id)
            .bind(message_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Binding {
            attachment_id,
            message_id,
        })
    }

    async fn delete_by_id(&self, id: Id) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE attachments
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("Attachment", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_models::{FileMeta, ImageMeta};

    fn row() -> AttachmentRow {
        AttachmentRow {
            id: 11,
            rel_user: 3,
            url: "attachments/11.png".to_string(),
            preview_url: "attachments/11_preview.jpg".to_string(),
            name: "cat.png".to_string(),
            meta: Json(AttachmentMeta {
                original: FileMeta {
                    size: 2048,
                    extension: "png".to_string(),
                    mimetype: "image/png".to_string(),
                    image: Some(ImageMeta {
                        width: 1600,
                        height: 300,
                        animated: false,
                    }),
                },
                preview: None,
            }),
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn test_row_into_attachment() {
        let row = row();
        let created_at = row.created_at;
        let attachment = Attachment::from(row);

        assert_eq!(attachment.id, 11);
        assert_eq!(attachment.user_id, 3);
        assert_eq!(attachment.created_at, Some(created_at));
        assert!(attachment.has_preview());
        assert_eq!(attachment.meta.original.width(), 1600);
    }

    #[test]
    fn test_joined_row_into_message_attachment() {
        let joined = MessageAttachmentRow {
            rel_message: 42,
            attachment: row(),
        };
        let ma = MessageAttachment::from(joined);
        assert_eq!(ma.message_id, 42);
        assert_eq!(ma.attachment.name, "cat.png");
    }
}
