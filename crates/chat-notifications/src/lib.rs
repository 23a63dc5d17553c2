//! # chat-notifications
//!
//! Outbound notifications for newly created messages.
//!
//! ## Features
//!
//! - `Notifier` capability consumed by the attachment pipeline
//! - In-process broadcast fan-out (`BroadcastNotifier`)
//! - Recording notifier for tests and dry runs (`MemoryNotifier`)

pub mod notification;
pub mod service;

pub use notification::{EventKind, MessageEvent};
pub use service::{BroadcastNotifier, MemoryNotifier, Notifier, NotifyError, NotifyResult};
