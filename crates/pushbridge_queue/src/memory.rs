//! In-memory queue backend for tests and single-process deployments.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use pushbridge_common::{BoxFuture, PushMessage};

use crate::error::QueueError;
use crate::queue::DeliveryQueue;

/// FIFO of serialized messages behind a mutex.
///
/// Messages are stored in their wire encoding, not as live structs, so
/// the serialization contract is exercised identically to the durable
/// backend.
#[derive(Default)]
pub struct InMemoryQueue {
    entries: Mutex<VecDeque<String>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeliveryQueue for InMemoryQueue {
    fn enqueue<'a>(&'a self, msg: &'a PushMessage) -> BoxFuture<'a, Result<(), QueueError>> {
        Box::pin(async move {
            let encoded = serde_json::to_string(msg)?;
            self.entries.lock().await.push_back(encoded);
            Ok(())
        })
    }

    fn dequeue(&self) -> BoxFuture<'_, Result<Option<PushMessage>, QueueError>> {
        Box::pin(async move {
            let entry = self.entries.lock().await.pop_front();
            match entry {
                Some(encoded) => Ok(Some(serde_json::from_str(&encoded)?)),
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushbridge_common::PushMessageBody;

    fn toast(subscription: &str, text: &str) -> PushMessage {
        PushMessage::new(
            subscription,
            PushMessageBody::Toast { text: text.into() },
        )
    }

    #[tokio::test]
    async fn dequeue_is_fifo_and_consumes() {
        let queue = InMemoryQueue::new();
        queue.enqueue(&toast("sports", "first")).await.unwrap();
        queue.enqueue(&toast("sports", "second")).await.unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first, toast("sports", "first"));
        let second = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(second, toast("sports", "second"));
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_queue_polls_none_immediately() {
        let queue = InMemoryQueue::new();
        assert!(queue.dequeue().await.unwrap().is_none());
    }
}
