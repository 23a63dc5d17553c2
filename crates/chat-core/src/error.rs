//! Core error type
//!
//! Library crates keep their own error enums; they convert into [`ChatError`]
//! at the application edge so callers get one stable set of error codes.

use thiserror::Error;

use crate::config::ConfigError;
use crate::traits::Id;

/// Core error type for all chat attachment operations
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Not found: {entity} with id={id}")]
    NotFound { entity: &'static str, id: Id },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// HTTP-equivalent status code, used for process exit codes and logs
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::NotFound { .. } => 404,
            ChatError::InvalidInput(_) => 422,
            ChatError::Storage(_)
            | ChatError::Database(_)
            | ChatError::Config(_)
            | ChatError::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ChatError::NotFound { .. } => "not_found",
            ChatError::InvalidInput(_) => "invalid_input",
            ChatError::Storage(_) => "storage_error",
            ChatError::Database(_) => "database_error",
            ChatError::Config(_) => "configuration_error",
            ChatError::Internal(_) => "internal_error",
        }
    }
}
