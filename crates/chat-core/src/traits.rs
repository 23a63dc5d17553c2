//! Core entity traits

use chrono::{DateTime, Utc};

/// Primary key type: unique, monotonically increasing 64-bit identifier
pub type Id = i64;

/// Trait for entities that have a primary key
pub trait Identifiable {
    fn id(&self) -> Id;
}

/// Trait for entities with timestamps (created_at, updated_at)
pub trait Timestamped {
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

/// Trait for soft-deletable entities
pub trait SoftDeletable {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}
