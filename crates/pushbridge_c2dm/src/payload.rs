//! C2DM send form encoding.
//!
//! Every notification is flattened into `data.*` form fields; the
//! receiving Android app keys off `data.type` to decide how to render
//! the message. `collapse_key` is constant: successive undelivered
//! notifications to an offline device collapse into the latest one.

use serde::Serialize;

use pushbridge_common::{PushMessage, PushMessageBody};

use crate::error::C2dmError;

#[derive(Serialize)]
struct SendForm<'a> {
    registration_id: &'a str,
    collapse_key: &'a str,
    #[serde(rename = "data.message")]
    message: &'a str,
    #[serde(rename = "data.type")]
    kind: &'a str,
    #[serde(rename = "data.sound", skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(rename = "data.count", skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

/// Renders `msg` as the urlencoded request body for one device, or
/// `None` when the message kind has no Android rendering.
pub fn encode_form(registration_id: &str, msg: &PushMessage) -> Option<Result<String, C2dmError>> {
    let (message, kind, sound, count) = match &msg.body {
        PushMessageBody::Toast { text } => (text.as_str(), "toast", None, None),
        PushMessageBody::Raw { data } => (data.as_str(), "raw", None, None),
        PushMessageBody::Iphone { alert, badge, sound } => {
            (alert.as_str(), "common", Some(sound.as_str()), Some(*badge))
        }
        PushMessageBody::Common { title, count, sound, .. } => {
            (title.as_str(), "common", Some(sound.as_str()), Some(*count))
        }
        PushMessageBody::Tile { .. } => return None,
    };

    let form = SendForm {
        registration_id,
        collapse_key: "0",
        message,
        kind,
        sound: sound.filter(|s| !s.is_empty()),
        count,
    };
    Some(serde_urlencoded::to_string(&form).map_err(C2dmError::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toast_form_has_message_and_type() {
        let msg = PushMessage::new(
            "sports",
            PushMessageBody::Toast {
                text: "Goal".into(),
            },
        );
        let body = encode_form("reg-1", &msg).unwrap().unwrap();
        assert!(body.contains("registration_id=reg-1"));
        assert!(body.contains("collapse_key=0"));
        assert!(body.contains("data.message=Goal"));
        assert!(body.contains("data.type=toast"));
        assert!(!body.contains("data.sound"));
    }

    #[test]
    fn common_form_carries_sound_and_count() {
        let msg = PushMessage::new(
            "news",
            PushMessageBody::Common {
                title: "headline".into(),
                count: 5,
                image: "https://example.com/tile.png".into(),
                sound: "ping".into(),
            },
        );
        let body = encode_form("reg-2", &msg).unwrap().unwrap();
        assert!(body.contains("data.type=common"));
        assert!(body.contains("data.sound=ping"));
        assert!(body.contains("data.count=5"));
    }

    #[test]
    fn iphone_form_renders_as_common() {
        let msg = PushMessage::new(
            "news",
            PushMessageBody::Iphone {
                alert: "headline".into(),
                badge: 3,
                sound: "ping".into(),
            },
        );
        let body = encode_form("reg-4", &msg).unwrap().unwrap();
        assert!(body.contains("data.type=common"));
        assert!(body.contains("data.message=headline"));
        assert!(body.contains("data.sound=ping"));
        assert!(body.contains("data.count=3"));
    }

    #[test]
    fn tile_has_no_android_rendering() {
        let msg = PushMessage::new(
            "sports",
            PushMessageBody::Tile {
                title: "Scores".into(),
                count: 1,
                image: "https://example.com/tile.png".into(),
            },
        );
        assert!(encode_form("reg-3", &msg).is_none());
    }
}
