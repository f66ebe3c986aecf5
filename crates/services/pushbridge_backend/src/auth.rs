//! HTTP Basic authentication for the admin endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use pushbridge_config::AuthConfig;

use crate::app_state::AppState;

/// Verifies admin credentials. Injected into the state so deployments
/// can swap the config-backed table for a directory lookup.
pub trait CredentialStore: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Credential table taken from the `[auth]` config section.
pub struct ConfigCredentialStore {
    users: Vec<(String, String)>,
}

impl ConfigCredentialStore {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            users: config
                .users
                .iter()
                .map(|u| (u.username.clone(), u.password.clone()))
                .collect(),
        }
    }
}

impl CredentialStore for ConfigCredentialStore {
    fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .iter()
            .any(|(u, p)| u == username && p == password)
    }
}

/// Middleware guarding the admin routes: a missing or bad Basic header
/// gets a 401 with the realm challenge.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_basic)
        .map(|(user, pass)| state.credentials.verify(&user, &pass))
        .unwrap_or(false);

    if authorized {
        next.run(request).await
    } else {
        debug!("rejecting unauthenticated admin request");
        challenge(&state.config.auth.realm)
    }
}

fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn challenge(realm: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{realm}\"")) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushbridge_config::AdminCredential;

    fn store() -> ConfigCredentialStore {
        ConfigCredentialStore::new(&AuthConfig {
            users: vec![AdminCredential {
                username: "admin".to_string(),
                password: "hunter2".to_string(),
            }],
            realm: "pushbridge".to_string(),
        })
    }

    #[test]
    fn verifies_against_the_config_table() {
        let store = store();
        assert!(store.verify("admin", "hunter2"));
        assert!(!store.verify("admin", "wrong"));
        assert!(!store.verify("nobody", "hunter2"));
    }

    #[test]
    fn decodes_well_formed_basic_headers() {
        let value = format!("Basic {}", BASE64.encode("admin:hunter2"));
        assert_eq!(
            decode_basic(&value),
            Some(("admin".to_string(), "hunter2".to_string()))
        );
        assert_eq!(decode_basic("Bearer xyz"), None);
        assert_eq!(decode_basic("Basic not-base64!"), None);
    }
}
