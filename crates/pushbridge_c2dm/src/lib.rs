//! Google Cloud to Device Messaging connection.
//!
//! C2DM delivery is a form-encoded POST per notification, authenticated
//! with a `GoogleLogin` token. The token comes either pre-issued from
//! config or from the ClientLogin exchange, and is cached until the
//! send endpoint rejects it.

pub mod connection;
pub mod error;
pub mod payload;
pub mod token;

pub use connection::C2dmConnection;
pub use error::C2dmError;

/// Default send endpoint.
pub const C2DM_SEND_URL: &str = "https://android.apis.google.com/c2dm/send";
/// ClientLogin token exchange endpoint.
pub const CLIENT_LOGIN_URL: &str = "https://www.google.com/accounts/ClientLogin";
