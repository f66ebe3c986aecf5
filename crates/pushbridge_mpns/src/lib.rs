//! Microsoft Push Notification Service connection.
//!
//! MPNS is stateless HTTP: each WP7 device registers the channel URI its
//! phone obtained from Microsoft, and delivery is one POST per
//! notification to that URI. The interesting parts are the WP7 XML
//! payloads, the batching-interval header codes, and the pruning rule:
//! a 404 from the channel means the URI is permanently dead, so the
//! device's subscriptions are removed instead of retrying.

pub mod connection;
pub mod payload;

pub use connection::MpnsConnection;
