use thiserror::Error;

/// The provider-agnostic error taxonomy for pushbridge.
///
/// Feature crates carry their own `thiserror` enums and convert into this
/// type at the API boundary, where `HttpStatusCode` maps each kind to the
/// response the front-end returns.
#[derive(Error, Debug)]
pub enum PushError {
    /// A device or subscription was looked up and does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// An idempotent create hit an existing record; callers usually treat
    /// this as success
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A device id, address, or message field failed validation
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Admin credentials were missing or wrong
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A provider network or TLS failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Unexpected persistence or serialization fault
    #[error("internal error: {0}")]
    Internal(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for PushError {
    fn status_code(&self) -> u16 {
        match self {
            PushError::NotFound(_) => 404,
            PushError::AlreadyExists(_) => 409,
            PushError::InvalidFormat(_) => 400,
            PushError::Unauthorized(_) => 401,
            PushError::Transport(_) => 502,
            PushError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for PushError {
    fn from(err: serde_json::Error) -> Self {
        PushError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for PushError {
    fn from(err: std::io::Error) -> Self {
        PushError::Internal(err.to_string())
    }
}
