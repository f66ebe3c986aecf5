//! The APNS provider connection.
//!
//! Holds one persistent gateway stream, lazily opened on first send and
//! reopened after transport errors. Delivery problems are reported as
//! failure events; the dispatcher never sees an error from this type.

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use pushbridge_common::{
    BoxFuture, Device, DeviceType, FailureKind, FailureSender, NotificationFailure, PushMessage,
    PushMessageBody, PushMessageType, PushProvider,
};
use pushbridge_config::ApnsConfig;

use crate::error::ApnsError;
use crate::payload::{compose_frame, encode_payload};
use crate::transport::{ApnsStream, ApnsTransport, TlsTransport};

pub struct ApnsConnection {
    transport: Box<dyn ApnsTransport>,
    stream: Mutex<Option<Box<dyn ApnsStream>>>,
    send_retries: u32,
    failures: FailureSender,
}

impl ApnsConnection {
    pub fn new(
        transport: Box<dyn ApnsTransport>,
        send_retries: u32,
        failures: FailureSender,
    ) -> Self {
        Self {
            transport,
            stream: Mutex::new(None),
            send_retries: send_retries.max(1),
            failures,
        }
    }

    pub fn from_config(config: &ApnsConfig, failures: FailureSender) -> Result<Self, ApnsError> {
        let transport = TlsTransport::from_config(config)?;
        Ok(Self::new(Box::new(transport), config.send_retries, failures))
    }

    fn report(&self, device_id: Option<&str>, kind: FailureKind, detail: String) {
        // The receiver lives for the whole process; a send error here just
        // means shutdown is underway.
        let _ = self.failures.send(NotificationFailure::new(
            DeviceType::Ios,
            device_id.map(str::to_string),
            kind,
            detail,
        ));
    }

    /// Writes one frame on the current stream, opening it if needed. Any
    /// IO error tears the stream down so the next attempt reconnects.
    async fn transmit(&self, frame: &[u8]) -> Result<(), ApnsError> {
        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            *guard = Some(self.transport.connect().await?);
        }
        if let Some(stream) = guard.as_mut() {
            let write = async {
                stream.write_all(frame).await?;
                stream.flush().await
            };
            if let Err(err) = write.await {
                *guard = None;
                return Err(err.into());
            }
        }
        Ok(())
    }
}

impl PushProvider for ApnsConnection {
    fn supported_device_type(&self) -> DeviceType {
        DeviceType::Ios
    }

    fn handles_message_type(&self, message_type: PushMessageType) -> bool {
        matches!(message_type, PushMessageType::Iphone | PushMessageType::Common)
    }

    fn enqueue_message<'a>(&'a self, device: &'a Device, msg: &'a PushMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if device.device_type != DeviceType::Ios
                || !self.handles_message_type(msg.message_type())
            {
                return;
            }

            let (alert, badge, sound) = match &msg.body {
                PushMessageBody::Iphone { alert, badge, sound } => {
                    (alert.as_str(), Some(*badge), sound.as_str())
                }
                PushMessageBody::Common { title, count, sound, .. } => {
                    (title.as_str(), Some(*count), sound.as_str())
                }
                _ => return,
            };
            let sound = (!sound.is_empty()).then_some(sound);

            let payload = match encode_payload(alert, badge, sound) {
                Ok(payload) => payload,
                Err(err) => {
                    self.report(
                        Some(&device.device_id),
                        FailureKind::NotificationFormat,
                        err.to_string(),
                    );
                    return;
                }
            };

            let frame = match compose_frame(&device.device_id, &payload) {
                Ok(frame) => frame,
                Err(err) => {
                    self.report(
                        Some(&device.device_id),
                        FailureKind::DeviceIdFormat,
                        err.to_string(),
                    );
                    return;
                }
            };

            let mut last_err = None;
            for attempt in 1..=self.send_retries {
                match self.transmit(&frame).await {
                    Ok(()) => {
                        debug!(device_id = %device.device_id, "APNS notification sent");
                        return;
                    }
                    Err(err) => {
                        warn!(
                            device_id = %device.device_id,
                            attempt,
                            "APNS send failed: {}",
                            err
                        );
                        last_err = Some(err);
                    }
                }
            }

            let detail = last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "send retries exhausted".to_string());
            self.report(Some(&device.device_id), FailureKind::Failed, detail);
        })
    }

    fn close<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(mut stream) = self.stream.lock().await.take() {
                if let Err(err) = stream.shutdown().await {
                    debug!("error closing APNS stream: {}", err);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::task::{Context, Poll};

    use tokio::io::AsyncWrite;
    use tokio::sync::mpsc;

    use pushbridge_common::FailureReceiver;

    struct ScriptedStream {
        sink: Arc<StdMutex<Vec<u8>>>,
        fail_writes: bool,
    }

    impl AsyncWrite for ScriptedStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.fail_writes {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted")))
            } else {
                self.sink.lock().unwrap().extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Hands out streams whose first `failing_streams` incarnations fail
    /// every write, then working ones.
    struct ScriptedTransport {
        sink: Arc<StdMutex<Vec<u8>>>,
        failing_streams: AtomicUsize,
        connects: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(failing_streams: usize) -> Self {
            Self {
                sink: Arc::new(StdMutex::new(Vec::new())),
                failing_streams: AtomicUsize::new(failing_streams),
                connects: AtomicUsize::new(0),
            }
        }
    }

    impl ApnsTransport for ScriptedTransport {
        fn connect(&self) -> BoxFuture<'_, Result<Box<dyn ApnsStream>, ApnsError>> {
            Box::pin(async move {
                self.connects.fetch_add(1, Ordering::SeqCst);
                let fail_writes = self
                    .failing_streams
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                Ok(Box::new(ScriptedStream {
                    sink: Arc::clone(&self.sink),
                    fail_writes,
                }) as Box<dyn ApnsStream>)
            })
        }
    }

    fn connection(
        failing_streams: usize,
        retries: u32,
    ) -> (ApnsConnection, Arc<ScriptedTransport>, FailureReceiver) {
        let transport = Arc::new(ScriptedTransport::new(failing_streams));
        let (tx, rx) = mpsc::unbounded_channel();
        struct Shared(Arc<ScriptedTransport>);
        impl ApnsTransport for Shared {
            fn connect(&self) -> BoxFuture<'_, Result<Box<dyn ApnsStream>, ApnsError>> {
                self.0.connect()
            }
        }
        let conn = ApnsConnection::new(Box::new(Shared(Arc::clone(&transport))), retries, tx);
        (conn, transport, rx)
    }

    fn ios_device(device_id: &str) -> Device {
        Device::new(DeviceType::Ios, device_id, "")
    }

    fn iphone_msg() -> PushMessage {
        PushMessage::new(
            "sports",
            PushMessageBody::Iphone {
                alert: "Goal!".into(),
                badge: 2,
                sound: "default".into(),
            },
        )
    }

    #[tokio::test]
    async fn capability_row_is_iphone_and_common_only() {
        let (conn, _, _rx) = connection(0, 1);
        assert_eq!(conn.supported_device_type(), DeviceType::Ios);
        assert!(!conn.handles_message_type(PushMessageType::Toast));
        assert!(!conn.handles_message_type(PushMessageType::Raw));
        assert!(!conn.handles_message_type(PushMessageType::Tile));
        assert!(conn.handles_message_type(PushMessageType::Iphone));
        assert!(conn.handles_message_type(PushMessageType::Common));
    }

    #[tokio::test]
    async fn sends_the_expected_frame() {
        let (conn, transport, mut rx) = connection(0, 3);
        let device_id = "ab".repeat(32);
        conn.enqueue_message(&ios_device(&device_id), &iphone_msg())
            .await;

        let payload = encode_payload("Goal!", Some(2), Some("default")).unwrap();
        let expected = compose_frame(&device_id, &payload).unwrap();
        assert_eq!(*transport.sink.lock().unwrap(), expected);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn common_message_maps_to_alert_and_badge() {
        let (conn, transport, mut rx) = connection(0, 3);
        let device_id = "cd".repeat(32);
        let msg = PushMessage::new(
            "news",
            PushMessageBody::Common {
                title: "headline".into(),
                count: 7,
                image: "https://example.com/tile.png".into(),
                sound: "ping".into(),
            },
        );
        conn.enqueue_message(&ios_device(&device_id), &msg).await;

        let payload = encode_payload("headline", Some(7), Some("ping")).unwrap();
        let expected = compose_frame(&device_id, &payload).unwrap();
        assert_eq!(*transport.sink.lock().unwrap(), expected);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_token_reports_without_connecting() {
        let (conn, transport, mut rx) = connection(0, 3);
        for bad in ["ab".repeat(31), "ab".repeat(33)] {
            conn.enqueue_message(&ios_device(&bad), &iphone_msg()).await;
            let event = rx.try_recv().unwrap();
            assert_eq!(event.kind, FailureKind::DeviceIdFormat);
            assert_eq!(event.device_id.as_deref(), Some(bad.as_str()));
        }
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
        assert!(transport.sink.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reconnects_and_retries_after_a_broken_stream() {
        let (conn, transport, mut rx) = connection(1, 3);
        let device_id = "ef".repeat(32);
        conn.enqueue_message(&ios_device(&device_id), &iphone_msg())
            .await;

        // First stream failed its write; the retry dialed a fresh one.
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
        let payload = encode_payload("Goal!", Some(2), Some("default")).unwrap();
        let expected = compose_frame(&device_id, &payload).unwrap();
        assert_eq!(*transport.sink.lock().unwrap(), expected);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn exhausted_retries_emit_a_failed_event() {
        let (conn, transport, mut rx) = connection(10, 2);
        let device_id = "12".repeat(32);
        conn.enqueue_message(&ios_device(&device_id), &iphone_msg())
            .await;

        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, FailureKind::Failed);
        assert_eq!(event.device_id.as_deref(), Some(device_id.as_str()));
    }

    #[tokio::test]
    async fn ignores_devices_and_kinds_it_does_not_handle() {
        let (conn, transport, mut rx) = connection(0, 3);

        // Wrong network.
        conn.enqueue_message(&Device::new(DeviceType::Android, "reg-1", ""), &iphone_msg())
            .await;
        // Unhandled message kind for Apple.
        let toast = PushMessage::new(
            "sports",
            PushMessageBody::Toast {
                text: "Goal!".into(),
            },
        );
        conn.enqueue_message(&ios_device(&"ab".repeat(32)), &toast)
            .await;

        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }
}
