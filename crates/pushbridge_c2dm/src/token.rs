//! GoogleLogin token acquisition.

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use pushbridge_common::BoxFuture;

use crate::error::C2dmError;
use crate::CLIENT_LOGIN_URL;

/// Source of the `GoogleLogin auth=...` token the send endpoint expects.
pub trait AccessTokenProvider: Send + Sync {
    fn token(&self) -> BoxFuture<'_, Result<String, C2dmError>>;

    /// Called when the send endpoint rejects the current token, so the
    /// next `token` call fetches a fresh one. No-op for fixed tokens.
    fn invalidate(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// A pre-issued token from config.
pub struct StaticToken(pub String);

impl AccessTokenProvider for StaticToken {
    fn token(&self) -> BoxFuture<'_, Result<String, C2dmError>> {
        let token = self.0.clone();
        Box::pin(async move { Ok(token) })
    }
}

#[derive(Serialize)]
struct LoginForm<'a> {
    #[serde(rename = "accountType")]
    account_type: &'a str,
    #[serde(rename = "Email")]
    email: &'a str,
    #[serde(rename = "Passwd")]
    password: &'a str,
    service: &'a str,
    source: &'a str,
}

/// Exchanges account credentials for a token via the ClientLogin flow
/// and caches it until invalidated.
pub struct ClientLogin {
    client: reqwest::Client,
    url: String,
    email: String,
    password: String,
    cached: Mutex<Option<String>>,
}

impl ClientLogin {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_url(CLIENT_LOGIN_URL, email, password)
    }

    pub fn with_url(
        url: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            email: email.into(),
            password: password.into(),
            cached: Mutex::new(None),
        }
    }

    async fn login(&self) -> Result<String, C2dmError> {
        let response = self
            .client
            .post(&self.url)
            .form(&LoginForm {
                account_type: "HOSTED_OR_GOOGLE",
                email: &self.email,
                password: &self.password,
                service: "ac2dm",
                source: "pushbridge",
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(C2dmError::Auth(format!("ClientLogin answered {status}")));
        }

        // The body is key=value lines; the one we need is Auth.
        body.lines()
            .find_map(|line| line.strip_prefix("Auth="))
            .map(str::to_string)
            .ok_or_else(|| C2dmError::Auth("ClientLogin response had no Auth line".to_string()))
    }
}

impl AccessTokenProvider for ClientLogin {
    fn token(&self) -> BoxFuture<'_, Result<String, C2dmError>> {
        Box::pin(async move {
            let mut cached = self.cached.lock().await;
            if let Some(token) = cached.as_ref() {
                return Ok(token.clone());
            }
            debug!("fetching ClientLogin token");
            let token = self.login().await?;
            *cached = Some(token.clone());
            Ok(token)
        })
    }

    fn invalidate(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.cached.lock().await.take();
        })
    }
}
