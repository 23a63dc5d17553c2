//! User directory
//!
//! Table: users

use async_trait::async_trait;
use chat_attachments::{RepositoryError, RepositoryResult, UserDirectory};
use chat_core::traits::Id;
use chat_models::User;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::repository::map_sqlx_error;

/// User database entity
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            name: row.name,
            email: row.email,
            created_at: Some(row.created_at),
        }
    }
}

/// Resolves message authors from the users table
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, name, email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(User::from)
            .ok_or_else(|| RepositoryError::not_found("User", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_into_user() {
        let user = User::from(UserRow {
            id: 1,
            username: "jdoe".to_string(),
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            created_at: Utc::now(),
        });

        assert_eq!(user.id, 1);
        assert_eq!(user.display_name(), "Jane Doe");
        assert!(user.created_at.is_some());
    }
}
