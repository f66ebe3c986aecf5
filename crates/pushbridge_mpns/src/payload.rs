//! WP7 notification payloads and header codes.
//!
//! Toast and tile notifications are small XML documents in the
//! `WPNotification` namespace; raw notifications carry the opaque data
//! string as-is. The `X-NotificationClass` header encodes both the
//! notification kind and the batching interval the service may apply:
//! tile is class 1, toast 2, raw 3, offset by 10 for a 450 ms wait and
//! by 20 for a 900 ms wait.

use pushbridge_config::Wp7BatchingPolicy;

/// The three wire-level WP7 notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wp7NotificationKind {
    Tile,
    Toast,
    Raw,
}

impl Wp7NotificationKind {
    /// Value of the `X-WindowsPhone-Target` header, when one is sent.
    /// Raw notifications carry no target header.
    pub fn target(&self) -> Option<&'static str> {
        match self {
            Wp7NotificationKind::Toast => Some("toast"),
            Wp7NotificationKind::Tile => Some("token"),
            Wp7NotificationKind::Raw => None,
        }
    }
}

/// Computes the `X-NotificationClass` code for a kind under the
/// configured batching policy.
pub fn notification_class(kind: Wp7NotificationKind, policy: Wp7BatchingPolicy) -> u8 {
    let base = match kind {
        Wp7NotificationKind::Tile => 1,
        Wp7NotificationKind::Toast => 2,
        Wp7NotificationKind::Raw => 3,
    };
    let offset = match policy {
        Wp7BatchingPolicy::Immediate => 0,
        Wp7BatchingPolicy::Wait450 => 10,
        Wp7BatchingPolicy::Wait900 => 20,
    };
    base + offset
}

/// Renders the toast XML document.
pub fn toast_body(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <wp:Notification xmlns:wp=\"WPNotification\">\
         <wp:Toast><wp:Text1>{}</wp:Text1></wp:Toast>\
         </wp:Notification>",
        escape_xml(text)
    )
}

/// Renders the tile XML document.
pub fn tile_body(title: &str, count: u32, image: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <wp:Notification xmlns:wp=\"WPNotification\">\
         <wp:Tile>\
         <wp:BackgroundImage>{}</wp:BackgroundImage>\
         <wp:Count>{}</wp:Count>\
         <wp:Title>{}</wp:Title>\
         </wp:Tile>\
         </wp:Notification>",
        escape_xml(image),
        count,
        escape_xml(title)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_codes_cover_the_kind_by_policy_grid() {
        use Wp7BatchingPolicy::*;
        use Wp7NotificationKind::*;

        assert_eq!(notification_class(Tile, Immediate), 1);
        assert_eq!(notification_class(Toast, Immediate), 2);
        assert_eq!(notification_class(Raw, Immediate), 3);
        assert_eq!(notification_class(Tile, Wait450), 11);
        assert_eq!(notification_class(Toast, Wait450), 12);
        assert_eq!(notification_class(Raw, Wait450), 13);
        assert_eq!(notification_class(Tile, Wait900), 21);
        assert_eq!(notification_class(Toast, Wait900), 22);
        assert_eq!(notification_class(Raw, Wait900), 23);
    }

    #[test]
    fn toast_body_carries_the_text_escaped() {
        let body = toast_body("1 < 2 & counting");
        assert!(body.contains("<wp:Text1>1 &lt; 2 &amp; counting</wp:Text1>"));
        assert!(body.starts_with("<?xml"));
    }

    #[test]
    fn tile_body_carries_title_count_and_image() {
        let body = tile_body("Scores", 4, "https://example.com/tile.png");
        assert!(body.contains("<wp:Title>Scores</wp:Title>"));
        assert!(body.contains("<wp:Count>4</wp:Count>"));
        assert!(body.contains("<wp:BackgroundImage>https://example.com/tile.png</wp:BackgroundImage>"));
    }
}
