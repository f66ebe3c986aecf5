//! Shared building blocks for the pushbridge workspace.
//!
//! This crate holds everything the feature crates have in common: the
//! domain models (devices and push messages), the provider-agnostic error
//! taxonomy, the `PushProvider` trait implemented by each push network
//! connection, the failure-event types the dispatcher consumes, and the
//! tracing initialization used by the backend binary.

pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod provider;

pub use error::PushError;
pub use models::{
    Device, DeviceType, PushMessage, PushMessageBody, PushMessageType,
    APNS_DEVICE_TOKEN_BINARY_SIZE,
};
pub use provider::{
    BoxFuture, FailureKind, FailureReceiver, FailureSender, NotificationFailure, PushProvider,
};
