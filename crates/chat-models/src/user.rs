//! User model
//!
//! Table: users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Id, Identifiable, Timestamped};

/// Message author as returned by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,

    /// Login handle (unique)
    pub username: String,

    /// Display name
    pub name: String,

    pub email: String,

    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: Id, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            name: String::new(),
            email: String::new(),
            created_at: None,
        }
    }

    /// Name shown next to messages
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

impl Identifiable for User {
    fn id(&self) -> Id {
        self.id
    }
}

impl Timestamped for User {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut user = User::new(1, "jdoe");
        assert_eq!(user.display_name(), "jdoe");

        user.name = "J. Doe".to_string();
        assert_eq!(user.display_name(), "J. Doe");
    }
}
