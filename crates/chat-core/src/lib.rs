//! # chat-core
//!
//! Core types, traits, and utilities shared by the chat attachment crates.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - Common error type with stable error codes
//! - Entity traits (Identifiable, Timestamped, SoftDeletable)
//! - Monotonic 64-bit id generation
//! - Configuration types and loading

pub mod config;
pub mod error;
pub mod ids;
pub mod traits;

pub use error::*;
pub use ids::{IdGenerator, SequentialIdGenerator, SnowflakeIdGenerator};
pub use traits::*;
