//! Error mapping from the driver to repository errors

use chat_attachments::RepositoryError;

/// PostgreSQL `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Translate a sqlx error, keeping duplicate keys distinguishable
pub fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    if matches!(err, sqlx::Error::RowNotFound) {
        return RepositoryError::NotFound("row not found".to_string());
    }

    if let Some(db) = err.as_database_error() {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return RepositoryError::Conflict(db.message().to_string());
        }
    }

    RepositoryError::database(err)
}
