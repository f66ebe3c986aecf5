use thiserror::Error;

/// Errors internal to the C2DM connection; delivery problems surface to
/// the dispatcher as failure events, never as these.
#[derive(Debug, Error)]
pub enum C2dmError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("notification form could not be encoded: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
