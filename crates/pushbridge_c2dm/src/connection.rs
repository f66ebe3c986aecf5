//! The C2DM provider connection.

use reqwest::StatusCode;
use tracing::{debug, warn};

use pushbridge_common::{
    BoxFuture, Device, DeviceType, FailureKind, FailureSender, NotificationFailure, PushMessage,
    PushMessageType, PushProvider,
};
use pushbridge_config::C2dmConfig;

use crate::error::C2dmError;
use crate::payload::encode_form;
use crate::token::{AccessTokenProvider, ClientLogin, StaticToken};
use crate::C2DM_SEND_URL;

pub struct C2dmConnection {
    client: reqwest::Client,
    endpoint: String,
    tokens: Box<dyn AccessTokenProvider>,
    send_retries: u32,
    failures: FailureSender,
}

impl C2dmConnection {
    pub fn new(
        endpoint: impl Into<String>,
        tokens: Box<dyn AccessTokenProvider>,
        send_retries: u32,
        failures: FailureSender,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            tokens,
            send_retries: send_retries.max(1),
            failures,
        }
    }

    pub fn from_config(config: &C2dmConfig, failures: FailureSender) -> Result<Self, C2dmError> {
        let tokens: Box<dyn AccessTokenProvider> = match (&config.auth_token, &config.account_email)
        {
            (Some(token), _) => Box::new(StaticToken(token.clone())),
            (None, Some(email)) => {
                let password = config.account_password.clone().ok_or_else(|| {
                    C2dmError::Auth("account_email set without account_password".to_string())
                })?;
                Box::new(ClientLogin::new(email.clone(), password))
            }
            (None, None) => {
                return Err(C2dmError::Auth(
                    "no auth_token and no account credentials configured".to_string(),
                ))
            }
        };
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| C2DM_SEND_URL.to_string());
        Ok(Self::new(endpoint, tokens, config.send_retries, failures))
    }

    fn report(&self, device_id: &str, kind: FailureKind, detail: String) {
        let _ = self.failures.send(NotificationFailure::new(
            DeviceType::Android,
            Some(device_id.to_string()),
            kind,
            detail,
        ));
    }

    async fn send(&self, device: &Device, body: &str) {
        let mut last_detail = String::new();

        for attempt in 1..=self.send_retries {
            let token = match self.tokens.token().await {
                Ok(token) => token,
                Err(err) => {
                    warn!(attempt, "C2DM token acquisition failed: {}", err);
                    last_detail = err.to_string();
                    continue;
                }
            };

            let result = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("GoogleLogin auth={token}"))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.to_string())
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    match status {
                        StatusCode::OK => {
                            let text = response.text().await.unwrap_or_default();
                            // A 200 can still be a rejection; the verdict
                            // is in the body.
                            if let Some(code) = text.trim().strip_prefix("Error=") {
                                self.report(
                                    &device.device_id,
                                    FailureKind::Failed,
                                    format!("C2DM rejected the message: {code}"),
                                );
                            } else {
                                debug!(device_id = %device.device_id, "C2DM notification sent");
                            }
                            return;
                        }
                        // The registration id is unknown to Google; more
                        // attempts cannot change that.
                        StatusCode::NOT_FOUND => {
                            self.report(
                                &device.device_id,
                                FailureKind::Failed,
                                "C2DM answered 404 for the registration id".to_string(),
                            );
                            return;
                        }
                        StatusCode::UNAUTHORIZED => {
                            warn!(attempt, "C2DM token rejected, refreshing");
                            self.tokens.invalidate().await;
                            last_detail = "C2DM answered 401".to_string();
                        }
                        other => {
                            warn!(
                                device_id = %device.device_id,
                                attempt,
                                "C2DM answered {}",
                                other
                            );
                            last_detail = format!("C2DM answered {other}");
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        device_id = %device.device_id,
                        attempt,
                        "C2DM send failed: {}",
                        err
                    );
                    last_detail = err.to_string();
                }
            }
        }

        self.report(&device.device_id, FailureKind::Failed, last_detail);
    }
}

impl PushProvider for C2dmConnection {
    fn supported_device_type(&self) -> DeviceType {
        DeviceType::Android
    }

    fn handles_message_type(&self, message_type: PushMessageType) -> bool {
        matches!(
            message_type,
            PushMessageType::Toast
                | PushMessageType::Raw
                | PushMessageType::Iphone
                | PushMessageType::Common
        )
    }

    fn enqueue_message<'a>(&'a self, device: &'a Device, msg: &'a PushMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if device.device_type != DeviceType::Android
                || !self.handles_message_type(msg.message_type())
            {
                return;
            }

            if device.device_id.trim().is_empty() {
                self.report(
                    &device.device_id,
                    FailureKind::DeviceIdFormat,
                    "empty registration id".to_string(),
                );
                return;
            }

            let body = match encode_form(&device.device_id, msg) {
                Some(Ok(body)) => body,
                Some(Err(err)) => {
                    self.report(
                        &device.device_id,
                        FailureKind::NotificationFormat,
                        err.to_string(),
                    );
                    return;
                }
                None => return,
            };

            self.send(device, &body).await;
        })
    }
}
