//! The MPNS provider connection.

use reqwest::StatusCode;
use tracing::{debug, warn};
use uuid::Uuid;

use pushbridge_common::models::validate_wp7_address;
use pushbridge_common::{
    BoxFuture, Device, DeviceType, FailureKind, FailureSender, NotificationFailure, PushMessage,
    PushMessageBody, PushMessageType,
    PushProvider,
};
use pushbridge_config::{MpnsConfig, Wp7BatchingPolicy};
use pushbridge_registry::{Registry, SharedRegistry};

use crate::payload::{notification_class, tile_body, toast_body, Wp7NotificationKind};

pub struct MpnsConnection {
    client: reqwest::Client,
    registry: SharedRegistry,
    batching_policy: Wp7BatchingPolicy,
    send_retries: u32,
    failures: FailureSender,
}

impl MpnsConnection {
    pub fn new(config: &MpnsConfig, registry: SharedRegistry, failures: FailureSender) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            batching_policy: config.batching_policy,
            send_retries: config.send_retries.max(1),
            failures,
        }
    }

    fn report(&self, device_id: &str, kind: FailureKind, detail: String) {
        let _ = self.failures.send(NotificationFailure::new(
            DeviceType::Wp7,
            Some(device_id.to_string()),
            kind,
            detail,
        ));
    }

    /// Drops every subscription of a device whose channel URI answered
    /// 404. The device row itself stays, so a fresh channel URI from the
    /// phone can revive it.
    async fn prune(&self, device: &Device) {
        warn!(
            device_id = %device.device_id,
            "MPNS channel gone (404), pruning subscriptions"
        );
        if let Err(err) = self.registry.delete_device_subscriptions(&device.device_id).await {
            warn!(
                device_id = %device.device_id,
                "failed to prune subscriptions: {}",
                err
            );
        }
    }

    async fn send(&self, device: &Device, kind: Wp7NotificationKind, body: String) {
        let class = notification_class(kind, self.batching_policy);
        let mut last_detail = String::new();

        for attempt in 1..=self.send_retries {
            let mut request = self
                .client
                .post(&device.address)
                .header("Content-Type", "text/xml")
                .header("X-MessageID", Uuid::new_v4().to_string())
                .header("X-NotificationClass", class.to_string());
            if let Some(target) = kind.target() {
                request = request.header("X-WindowsPhone-Target", target);
            }

            match request.body(body.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        self.prune(device).await;
                        return;
                    }

                    // The status code alone does not settle delivery: MPNS
                    // reports a temporarily disconnected phone or a full
                    // notification queue in these headers, even on a 200.
                    let connection_status = header_value(&response, "X-DeviceConnectionStatus");
                    let notification_status = header_value(&response, "X-NotificationStatus");
                    let transient = connection_status.as_deref() == Some("TempDisconnected")
                        || notification_status.as_deref() == Some("QueueFull");

                    if transient {
                        warn!(
                            device_id = %device.device_id,
                            attempt,
                            connection_status = connection_status.as_deref().unwrap_or("-"),
                            notification_status = notification_status.as_deref().unwrap_or("-"),
                            "MPNS delivery deferred"
                        );
                        last_detail = format!(
                            "MPNS deferred delivery (connection {}, notification {})",
                            connection_status.as_deref().unwrap_or("-"),
                            notification_status.as_deref().unwrap_or("-"),
                        );
                    } else if status.is_success() {
                        debug!(device_id = %device.device_id, "MPNS notification sent");
                        return;
                    } else {
                        self.report(
                            &device.device_id,
                            FailureKind::Failed,
                            format!("MPNS answered {status}"),
                        );
                        return;
                    }
                }
                Err(err) => {
                    warn!(
                        device_id = %device.device_id,
                        attempt,
                        "MPNS send failed: {}",
                        err
                    );
                    last_detail = err.to_string();
                }
            }
        }

        self.report(&device.device_id, FailureKind::Failed, last_detail);
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

impl PushProvider for MpnsConnection {
    fn supported_device_type(&self) -> DeviceType {
        DeviceType::Wp7
    }

    fn handles_message_type(&self, message_type: PushMessageType) -> bool {
        matches!(
            message_type,
            PushMessageType::Toast
                | PushMessageType::Raw
                | PushMessageType::Tile
                | PushMessageType::Common
        )
    }

    fn enqueue_message<'a>(&'a self, device: &'a Device, msg: &'a PushMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if device.device_type != DeviceType::Wp7
                || !self.handles_message_type(msg.message_type())
            {
                return;
            }

            if let Err(err) = validate_wp7_address(&device.address) {
                self.report(
                    &device.device_id,
                    FailureKind::DeviceIdFormat,
                    err.to_string(),
                );
                return;
            }

            let (kind, body) = match &msg.body {
                PushMessageBody::Toast { text } => {
                    (Wp7NotificationKind::Toast, toast_body(text))
                }
                PushMessageBody::Raw { data } => (Wp7NotificationKind::Raw, data.clone()),
                PushMessageBody::Tile { title, count, image } => {
                    (Wp7NotificationKind::Tile, tile_body(title, *count, image))
                }
                // The generic notification becomes a tile on WP7.
                PushMessageBody::Common { title, count, image, .. } => {
                    (Wp7NotificationKind::Tile, tile_body(title, *count, image))
                }
                PushMessageBody::Iphone { .. } => return,
            };

            self.send(device, kind, body).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use pushbridge_common::FailureReceiver;
    use pushbridge_registry::{create_registry, Registry};

    fn config(retries: u32) -> MpnsConfig {
        MpnsConfig {
            batching_policy: Wp7BatchingPolicy::Immediate,
            send_retries: retries,
        }
    }

    fn connection(retries: u32) -> (MpnsConnection, SharedRegistry, FailureReceiver) {
        let registry = create_registry();
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = MpnsConnection::new(&config(retries), registry.clone(), tx);
        (conn, registry, rx)
    }

    fn wp7_device(address: &str) -> Device {
        Device::new(DeviceType::Wp7, "wp7-1", address)
    }

    fn toast(text: &str) -> PushMessage {
        PushMessage::new("sports", PushMessageBody::Toast { text: text.into() })
    }

    #[tokio::test]
    async fn capability_row_is_everything_but_iphone() {
        let (conn, _, _rx) = connection(1);
        assert_eq!(conn.supported_device_type(), DeviceType::Wp7);
        assert!(conn.handles_message_type(PushMessageType::Toast));
        assert!(conn.handles_message_type(PushMessageType::Raw));
        assert!(conn.handles_message_type(PushMessageType::Tile));
        assert!(!conn.handles_message_type(PushMessageType::Iphone));
        assert!(conn.handles_message_type(PushMessageType::Common));
    }

    #[tokio::test]
    async fn toast_posts_the_wp7_xml_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channel"))
            .and(header("X-WindowsPhone-Target", "toast"))
            .and(header("X-NotificationClass", "2"))
            .and(header_exists("X-MessageID"))
            .and(body_string_contains("<wp:Text1>Goal!</wp:Text1>"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (conn, _, mut rx) = connection(3);
        let device = wp7_device(&format!("{}/channel", server.uri()));
        conn.enqueue_message(&device, &toast("Goal!")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tile_targets_the_token_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-WindowsPhone-Target", "token"))
            .and(header("X-NotificationClass", "1"))
            .and(body_string_contains("<wp:Title>Scores</wp:Title>"))
            .and(body_string_contains("<wp:Count>4</wp:Count>"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (conn, _, _rx) = connection(3);
        let device = wp7_device(&server.uri());
        let msg = PushMessage::new(
            "sports",
            PushMessageBody::Tile {
                title: "Scores".into(),
                count: 4,
                image: "https://example.com/tile.png".into(),
            },
        );
        conn.enqueue_message(&device, &msg).await;
    }

    #[tokio::test]
    async fn raw_sends_the_data_verbatim_without_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-NotificationClass", "3"))
            .and(body_string_contains("{\"score\":3}"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (conn, _, _rx) = connection(3);
        let device = wp7_device(&server.uri());
        let msg = PushMessage::new(
            "sports",
            PushMessageBody::Raw {
                data: "{\"score\":3}".into(),
            },
        );
        conn.enqueue_message(&device, &msg).await;
    }

    #[tokio::test]
    async fn a_404_prunes_subscriptions_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (conn, registry, mut rx) = connection(5);
        let device = wp7_device(&server.uri());
        registry
            .register_device(DeviceType::Wp7, &device.device_id, &device.address)
            .await
            .unwrap();
        registry.create_subscription("sports", "scores").await.unwrap();
        registry
            .add_device_subscription(&device.device_id, "sports")
            .await
            .unwrap();

        conn.enqueue_message(&device, &toast("Goal!")).await;

        // Subscriptions are gone, the device registration is not.
        let devices = registry
            .devices_for_subscription("sports")
            .await
            .unwrap();
        assert!(devices.is_empty());
        assert!(registry.is_device_registered(&device.device_id).await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn temp_disconnected_is_retried() {
        let server = MockServer::start().await;
        // First attempt finds a temporarily disconnected phone.
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(412)
                    .insert_header("X-DeviceConnectionStatus", "TempDisconnected"),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (conn, _, mut rx) = connection(3);
        conn.enqueue_message(&wp7_device(&server.uri()), &toast("Goal!"))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn queue_full_on_200_is_not_success() {
        let server = MockServer::start().await;
        // The channel accepts the POST but parks the notification; the
        // 200 status must not be read as delivered.
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("X-NotificationStatus", "QueueFull"),
            )
            .expect(3)
            .mount(&server)
            .await;

        let (conn, _, mut rx) = connection(3);
        let device = wp7_device(&server.uri());
        conn.enqueue_message(&device, &toast("Goal!")).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, FailureKind::Failed);
        assert_eq!(event.device_id.as_deref(), Some("wp7-1"));
        assert!(event.detail.contains("QueueFull"));
    }

    #[tokio::test]
    async fn exhausted_retries_emit_a_failed_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(412)
                    .insert_header("X-DeviceConnectionStatus", "TempDisconnected"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let (conn, _, mut rx) = connection(2);
        let device = wp7_device(&server.uri());
        conn.enqueue_message(&device, &toast("Goal!")).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, FailureKind::Failed);
        assert_eq!(event.device_id.as_deref(), Some("wp7-1"));
    }

    #[tokio::test]
    async fn other_error_statuses_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (conn, _, mut rx) = connection(5);
        conn.enqueue_message(&wp7_device(&server.uri()), &toast("Goal!"))
            .await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, FailureKind::Failed);
    }

    #[tokio::test]
    async fn malformed_channel_uri_reports_without_sending() {
        let (conn, _, mut rx) = connection(3);
        conn.enqueue_message(&wp7_device("not a uri"), &toast("Goal!"))
            .await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, FailureKind::DeviceIdFormat);
    }
}
