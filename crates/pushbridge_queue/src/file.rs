//! Durable queue backend: one JSON message per line, oldest first.
//!
//! Dequeue rewrites the file without the consumed line before returning
//! the message, which is the receive-then-delete contract. Throughput
//! needs here are modest (one message per dispatcher wake), so the
//! rewrite cost is acceptable.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::warn;

use pushbridge_common::{BoxFuture, PushMessage};

use crate::error::QueueError;
use crate::queue::DeliveryQueue;

pub struct FileQueue {
    path: PathBuf,
    // Serializes all file access; there is one producer (the API) and one
    // consumer (the dispatcher) but enqueues can race each other.
    lock: Mutex<()>,
}

impl FileQueue {
    /// Opens (creating if needed) the queue file.
    pub fn open(path: &Path) -> Result<Self, QueueError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            std::fs::write(path, b"")?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    async fn read_lines(&self) -> Result<Vec<String>, QueueError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl DeliveryQueue for FileQueue {
    fn enqueue<'a>(&'a self, msg: &'a PushMessage) -> BoxFuture<'a, Result<(), QueueError>> {
        Box::pin(async move {
            let encoded = serde_json::to_string(msg)?;
            let _guard = self.lock.lock().await;
            let mut contents = tokio::fs::read_to_string(&self.path)
                .await
                .unwrap_or_default();
            contents.push_str(&encoded);
            contents.push('\n');
            tokio::fs::write(&self.path, contents).await?;
            Ok(())
        })
    }

    fn dequeue(&self) -> BoxFuture<'_, Result<Option<PushMessage>, QueueError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut lines = self.read_lines().await?;
            if lines.is_empty() {
                return Ok(None);
            }
            let head = lines.remove(0);

            // Delete before decode: the message must not be redelivered
            // even if it turns out to be unreadable.
            let mut remainder = lines.join("\n");
            if !remainder.is_empty() {
                remainder.push('\n');
            }
            tokio::fs::write(&self.path, remainder).await?;

            match serde_json::from_str(&head) {
                Ok(msg) => Ok(Some(msg)),
                Err(err) => {
                    warn!("dropping undecodable queue entry: {}", err);
                    Err(err.into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushbridge_common::PushMessageBody;

    fn raw(subscription: &str, data: &str) -> PushMessage {
        PushMessage::new(subscription, PushMessageBody::Raw { data: data.into() })
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.jsonl");

        {
            let queue = FileQueue::open(&path).unwrap();
            queue.enqueue(&raw("alerts", "one")).await.unwrap();
            queue.enqueue(&raw("alerts", "two")).await.unwrap();
        }

        // A fresh handle over the same file sees the backlog in order.
        let queue = FileQueue::open(&path).unwrap();
        assert_eq!(queue.dequeue().await.unwrap().unwrap(), raw("alerts", "one"));
        assert_eq!(queue.dequeue().await.unwrap().unwrap(), raw("alerts", "two"));
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dequeued_message_is_not_redelivered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.jsonl");
        let queue = FileQueue::open(&path).unwrap();
        queue.enqueue(&raw("alerts", "only")).await.unwrap();

        assert!(queue.dequeue().await.unwrap().is_some());

        // Even a brand new handle finds nothing: the delete happened
        // before the message was returned.
        let reopened = FileQueue::open(&path).unwrap();
        assert!(reopened.dequeue().await.unwrap().is_none());
    }
}
