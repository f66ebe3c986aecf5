use pushbridge_common::PushError;
use thiserror::Error;

/// Errors from delivery-queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A message failed to encode or decode
    #[error("queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The queue file could not be read or written
    #[error("queue storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<QueueError> for PushError {
    fn from(err: QueueError) -> Self {
        PushError::Internal(err.to_string())
    }
}
