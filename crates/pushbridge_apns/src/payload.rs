//! APNS payload and frame encoding.
//!
//! The binary protocol carries one notification per frame:
//!
//! ```text
//! | 0x00 | token len (u16 BE) | token (32 bytes) | payload len (u16 BE) | payload |
//! ```
//!
//! The payload is the `{"aps":{...}}` JSON document and must not exceed
//! 256 bytes; alerts are truncated until the encoded document fits.

use serde::Serialize;

use pushbridge_common::APNS_DEVICE_TOKEN_BINARY_SIZE;

use crate::error::ApnsError;

/// Hard protocol cap on the encoded JSON payload.
pub const MAX_PAYLOAD_SIZE: usize = 256;

#[derive(Serialize)]
struct Payload<'a> {
    aps: Aps<'a>,
}

#[derive(Serialize)]
struct Aps<'a> {
    alert: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
}

/// Encodes the `aps` JSON document, shortening the alert text as needed
/// to stay within [`MAX_PAYLOAD_SIZE`].
pub fn encode_payload(
    alert: &str,
    badge: Option<u32>,
    sound: Option<&str>,
) -> Result<Vec<u8>, ApnsError> {
    let mut alert = alert.to_string();
    loop {
        let doc = serde_json::to_vec(&Payload {
            aps: Aps {
                alert: &alert,
                badge,
                sound,
            },
        })?;
        if doc.len() <= MAX_PAYLOAD_SIZE || alert.is_empty() {
            return Ok(doc);
        }
        alert.pop();
    }
}

/// Builds the complete binary frame for one notification.
///
/// The device token must be 64 hex characters decoding to exactly 32
/// bytes; anything else is rejected before a single byte is written to
/// the socket.
pub fn compose_frame(device_id: &str, payload: &[u8]) -> Result<Vec<u8>, ApnsError> {
    let token = hex::decode(device_id)
        .map_err(|_| ApnsError::InvalidDeviceToken(device_id.to_string()))?;
    if token.len() != APNS_DEVICE_TOKEN_BINARY_SIZE {
        return Err(ApnsError::InvalidDeviceToken(device_id.to_string()));
    }

    let mut frame = Vec::with_capacity(1 + 2 + token.len() + 2 + payload.len());
    frame.push(0x00);
    frame.extend_from_slice(&(token.len() as u16).to_be_bytes());
    frame.extend_from_slice(&token);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}
