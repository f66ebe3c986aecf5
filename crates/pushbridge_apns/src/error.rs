use thiserror::Error;

/// Errors internal to the APNS connection. These never escape to the
/// dispatcher; exhausted retries surface as failure events instead.
#[derive(Debug, Error)]
pub enum ApnsError {
    #[error("device token is not 64 hex characters: {0}")]
    InvalidDeviceToken(String),

    #[error("notification payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
