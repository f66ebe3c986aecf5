//! Domain models shared across the pushbridge crates.
//!
//! A `Device` is a registered push target on one of the three networks; a
//! `PushMessage` is the logical notification the front-end enqueues and
//! the dispatcher fans out. Both are serialized with serde: devices for
//! API responses, messages for the delivery queue wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PushError;

/// Apple device tokens are 32 binary bytes, carried as 64 hex characters.
pub const APNS_DEVICE_TOKEN_BINARY_SIZE: usize = 32;

/// The three push networks a device can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "iOS")]
    Ios,
    Android,
    #[serde(rename = "WP7")]
    Wp7,
}

impl DeviceType {
    /// The wire tag used in registration calls and registry rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Ios => "iOS",
            DeviceType::Android => "Android",
            DeviceType::Wp7 => "WP7",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iOS" => Ok(DeviceType::Ios),
            "Android" => Ok(DeviceType::Android),
            "WP7" => Ok(DeviceType::Wp7),
            other => Err(PushError::InvalidFormat(format!(
                "unknown device type: {other}"
            ))),
        }
    }
}

/// A registered device.
///
/// Identity is the (device_id, device_type) pair. `address` is the MPNS
/// channel URI for WP7 devices and empty for the other networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_type: DeviceType,
    pub address: String,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    pub fn new(device_type: DeviceType, device_id: impl Into<String>, address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            device_id: device_id.into(),
            device_type,
            address: address.into(),
            registered_at: now,
            updated_at: now,
        }
    }
}

/// Checks that an iOS device id is exactly 32 bytes, hex encoded.
pub fn validate_ios_device_id(device_id: &str) -> Result<(), PushError> {
    let bytes = hex::decode(device_id)
        .map_err(|_| PushError::InvalidFormat(format!("device id is not hex: {device_id}")))?;
    if bytes.len() != APNS_DEVICE_TOKEN_BINARY_SIZE {
        return Err(PushError::InvalidFormat(format!(
            "device id decodes to {} bytes, expected {}",
            bytes.len(),
            APNS_DEVICE_TOKEN_BINARY_SIZE
        )));
    }
    Ok(())
}

/// Checks that a WP7 channel address is an absolute, well-formed URI.
pub fn validate_wp7_address(address: &str) -> Result<(), PushError> {
    let uri: http::Uri = address
        .parse()
        .map_err(|_| PushError::InvalidFormat(format!("malformed channel URI: {address}")))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(PushError::InvalidFormat(format!(
            "channel URI must be absolute: {address}"
        )));
    }
    Ok(())
}

/// Listing form of a device, as returned by the admin endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: DeviceType,
    pub device_uri: String,
}

/// A named topic devices opt into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub name: String,
    pub description: String,
}

/// A subscription paired with whether a given device has opted in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSubscriptionInfo {
    pub name: String,
    pub description: String,
    pub is_subscribed: bool,
}

/// The five logical message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushMessageType {
    Toast,
    Raw,
    Tile,
    Iphone,
    Common,
}

/// The per-kind payload of a logical notification.
///
/// This is a closed union: each provider connection owns a formatter that
/// maps the variants it handles to its wire format, so no provider field
/// names leak into this model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessageBody {
    Toast {
        text: String,
    },
    Raw {
        data: String,
    },
    Tile {
        title: String,
        count: u32,
        image: String,
    },
    Iphone {
        alert: String,
        badge: u32,
        sound: String,
    },
    Common {
        title: String,
        count: u32,
        image: String,
        sound: String,
    },
}

/// A logical notification addressed to a subscription.
///
/// Ephemeral: built by the API layer, serialized onto the delivery queue,
/// consumed exactly once by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub subscription: String,
    #[serde(flatten)]
    pub body: PushMessageBody,
}

impl PushMessage {
    pub fn new(subscription: impl Into<String>, body: PushMessageBody) -> Self {
        Self {
            subscription: subscription.into(),
            body,
        }
    }

    pub fn message_type(&self) -> PushMessageType {
        match self.body {
            PushMessageBody::Toast { .. } => PushMessageType::Toast,
            PushMessageBody::Raw { .. } => PushMessageType::Raw,
            PushMessageBody::Tile { .. } => PushMessageType::Tile,
            PushMessageBody::Iphone { .. } => PushMessageType::Iphone,
            PushMessageBody::Common { .. } => PushMessageType::Common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_round_trips_through_wire_tags() {
        for (tag, expected) in [
            ("iOS", DeviceType::Ios),
            ("Android", DeviceType::Android),
            ("WP7", DeviceType::Wp7),
        ] {
            let parsed: DeviceType = tag.parse().unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.as_str(), tag);
        }
        assert!("Symbian".parse::<DeviceType>().is_err());
    }

    #[test]
    fn ios_device_id_must_decode_to_32_bytes() {
        let ok = "ab".repeat(32);
        assert!(validate_ios_device_id(&ok).is_ok());

        let short = "ab".repeat(31);
        let long = "ab".repeat(33);
        assert!(matches!(
            validate_ios_device_id(&short),
            Err(PushError::InvalidFormat(_))
        ));
        assert!(matches!(
            validate_ios_device_id(&long),
            Err(PushError::InvalidFormat(_))
        ));
        assert!(validate_ios_device_id("not-hex").is_err());
    }

    #[test]
    fn wp7_address_must_be_absolute() {
        assert!(validate_wp7_address("https://example.com/channel").is_ok());
        assert!(validate_wp7_address("/relative/path").is_err());
        assert!(validate_wp7_address("not a uri at all").is_err());
    }

    #[test]
    fn message_type_matches_body_variant() {
        let msg = PushMessage::new(
            "sports",
            PushMessageBody::Toast {
                text: "Goal!".into(),
            },
        );
        assert_eq!(msg.message_type(), PushMessageType::Toast);
    }

    #[test]
    fn push_message_survives_queue_serialization() {
        let msg = PushMessage::new(
            "news",
            PushMessageBody::Common {
                title: "headline".into(),
                count: 3,
                image: "https://example.com/tile.png".into(),
                sound: "default".into(),
            },
        );
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: PushMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }
}
