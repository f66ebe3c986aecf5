use pushbridge_common::PushError;
use thiserror::Error;

/// Errors from registry operations.
///
/// Domain "not found" kinds are distinct from storage faults so the API
/// layer can map them to 404 instead of 500.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No device with the given id is registered
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// No subscription with the given name exists
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// The device exists but is not subscribed to the given topic
    #[error("device {device_id} is not subscribed to {subscription}")]
    NotSubscribed {
        device_id: String,
        subscription: String,
    },

    /// Unexpected persistence fault
    #[error("registry storage error: {0}")]
    Storage(String),
}

impl From<RegistryError> for PushError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DeviceNotFound(_)
            | RegistryError::SubscriptionNotFound(_)
            | RegistryError::NotSubscribed { .. } => PushError::NotFound(err.to_string()),
            RegistryError::Storage(_) => PushError::Internal(err.to_string()),
        }
    }
}
