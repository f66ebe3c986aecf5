use std::sync::Arc;

use pushbridge_common::{BoxFuture, PushMessage};

use crate::error::QueueError;

/// The delivery-queue contract.
///
/// Single consumer: only the dispatcher dequeues. `dequeue` is a
/// non-blocking poll that returns `None` immediately when empty; the
/// caller owns the backoff between polls.
pub trait DeliveryQueue: Send + Sync {
    /// Serializes the message and appends it to the queue.
    fn enqueue<'a>(&'a self, msg: &'a PushMessage) -> BoxFuture<'a, Result<(), QueueError>>;

    /// Removes and returns the oldest message, if any. The message is
    /// deleted before it is returned, so a worker crash after this call
    /// loses the message rather than redelivering it.
    fn dequeue(&self) -> BoxFuture<'_, Result<Option<PushMessage>, QueueError>>;
}

/// The queue as shared by the backend and the dispatcher.
pub type SharedQueue = Arc<dyn DeliveryQueue>;
