//! The provider connection abstraction.
//!
//! Each push network (Apple, Microsoft, Google) implements `PushProvider`.
//! Delivery failures never cross the trait boundary as errors: a
//! connection reports them on its failure channel so one bad device
//! cannot abort a batch, and the dispatcher's logging task is the single
//! consumer of that channel.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::models::{Device, DeviceType, PushMessage, PushMessageType};

/// Type alias for a boxed future, used to keep `PushProvider` object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What went wrong with a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The device id or address was malformed; nothing was transmitted
    DeviceIdFormat,
    /// The message could not be rendered into the provider's wire format
    NotificationFormat,
    /// A connection-level error (TCP, TLS handshake)
    Notification,
    /// Transmission was attempted and retries were exhausted
    Failed,
}

/// A delivery failure event, emitted by a connection and logged by the
/// dispatcher. Carries enough context to identify the offending device.
#[derive(Debug, Clone)]
pub struct NotificationFailure {
    pub provider: DeviceType,
    pub device_id: Option<String>,
    pub kind: FailureKind,
    pub detail: String,
}

impl NotificationFailure {
    pub fn new(
        provider: DeviceType,
        device_id: Option<String>,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            device_id,
            kind,
            detail: detail.into(),
        }
    }
}

/// Sender half of a connection's failure channel.
pub type FailureSender = mpsc::UnboundedSender<NotificationFailure>;

/// Receiver half, owned by the dispatcher's logging task.
pub type FailureReceiver = mpsc::UnboundedReceiver<NotificationFailure>;

/// A long-lived connection to one push network.
///
/// Only the dispatcher calls these methods, in sequence within one
/// dispatch cycle, so implementations need `Send + Sync` but not
/// reentrancy.
pub trait PushProvider: Send + Sync {
    /// The one device type this connection can deliver to.
    fn supported_device_type(&self) -> DeviceType;

    /// Static capability table: whether this provider accepts the given
    /// logical message kind. A `false` here means the dispatcher never
    /// routes such messages to this connection.
    fn handles_message_type(&self, message_type: PushMessageType) -> bool;

    /// Format and transmit `msg` to a single device. Devices of the wrong
    /// type or messages of an unhandled kind are skipped without error;
    /// delivery failures are reported on the failure channel.
    fn enqueue_message<'a>(&'a self, device: &'a Device, msg: &'a PushMessage) -> BoxFuture<'a, ()>;

    /// Batch overload: deliver `msg` to each device in turn. One device's
    /// failure never aborts the rest of the batch.
    fn enqueue_batch<'a>(&'a self, devices: &'a [Device], msg: &'a PushMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            for device in devices {
                self.enqueue_message(device, msg).await;
            }
        })
    }

    /// Tear down any persistent transport state. Called once at shutdown.
    fn close<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
