//! Apple Push Notification Service connection.
//!
//! APNS speaks a binary protocol over a persistent, mutually
//! authenticated TLS socket: one frame per notification, each frame
//! carrying the 32-byte device token and a JSON payload capped at 256
//! bytes. The connection is reused across sends and reopened with
//! bounded retries when the transport drops.

pub mod connection;
pub mod error;
pub mod payload;
pub mod transport;

pub use connection::ApnsConnection;
pub use error::ApnsError;

/// Sandbox gateway host.
pub const HOST_SANDBOX: &str = "gateway.sandbox.push.apple.com";
/// Production gateway host.
pub const HOST_PRODUCTION: &str = "gateway.push.apple.com";
/// APNS binary-protocol port.
pub const APNS_PORT: u16 = 2195;
