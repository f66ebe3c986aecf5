//! The delivery queue between the front-end API and the dispatcher.
//!
//! A durable, ordered, single-reader channel. Messages are serialized on
//! enqueue and removed before the deserialized message is handed to the
//! caller (receive-then-delete), so a message the worker has seen is
//! never redelivered.

pub mod error;
pub mod file;
pub mod memory;
pub mod queue;

pub use error::QueueError;
pub use file::FileQueue;
pub use memory::InMemoryQueue;
pub use queue::{DeliveryQueue, SharedQueue};

use std::path::Path;
use std::sync::Arc;

/// Creates the queue backend: file-backed when a path is configured,
/// in-memory otherwise.
pub fn create_queue(path: Option<&Path>) -> Result<SharedQueue, QueueError> {
    Ok(match path {
        Some(path) => Arc::new(FileQueue::open(path)?),
        None => Arc::new(InMemoryQueue::new()),
    })
}
