//! Structured key encoding.
//!
//! Control rows share the backend namespace with user data, so their keys
//! are built from fixed roots and base64url-encoded name segments:
//!
//! - listeners: `"_Event:<b64url(name)>:<id>"`
//! - queue meta: `"_MessageQueue:<b64url(queue)>"`
//! - queue items: `"_MessageQueue:<b64url(queue)>:<index>"`
//! - operation rows: `"_Operation:<uuid>"`, manifest at `"_Operation"`
//!
//! Encoding the free-form name makes the `:` delimiter unambiguous and keeps
//! the key character set restricted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Root of listener keys.
pub const EVENT_ROOT: &str = "_Event";
/// Root of queue meta and item keys.
pub const QUEUE_ROOT: &str = "_MessageQueue";
/// Root of queue event names fed to the dispatcher.
pub const QUEUE_EVENT_ROOT: &str = "MQE";
/// Key of the version manifest row; prefix of operation rows.
pub const OP_TABLE: &str = "_Operation";

/// Encodes a string with the URL-safe base64 alphabet, no padding.
#[must_use]
pub fn b64url_encode(s: &str) -> String {
    URL_SAFE_NO_PAD.encode(s.as_bytes())
}

/// Decodes a padless URL-safe base64 string back to UTF-8.
///
/// Returns `None` if the input is not valid base64url or does not decode to
/// UTF-8.
#[must_use]
pub fn b64url_decode(s: &str) -> Option<String> {
    URL_SAFE_NO_PAD
        .decode(s.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Builds a listener key from an event name and listener id.
#[must_use]
pub fn listener_key(event_name: &str, listener_id: &str) -> String {
    format!("{EVENT_ROOT}:{}:{listener_id}", b64url_encode(event_name))
}

/// Returns the dispatch prefix shared by all listeners of one event.
#[must_use]
pub fn listener_prefix(event_name: &str) -> String {
    format!("{EVENT_ROOT}:{}:", b64url_encode(event_name))
}

/// Extracts the listener id (third colon-delimited segment) from a listener
/// key. Returns `None` for keys outside the `_Event` namespace.
#[must_use]
pub fn listener_id_of(key: &str) -> Option<&str> {
    let mut parts = key.splitn(3, ':');
    if parts.next() != Some(EVENT_ROOT) {
        return None;
    }
    parts.next()?;
    parts.next()
}

/// Extracts and decodes the event name from a listener key.
#[must_use]
pub fn listener_event_of(key: &str) -> Option<String> {
    let mut parts = key.splitn(3, ':');
    if parts.next() != Some(EVENT_ROOT) {
        return None;
    }
    b64url_decode(parts.next()?)
}

/// Builds the meta key for a queue, from its encoded name.
#[must_use]
pub fn queue_meta_key(encoded_queue: &str) -> String {
    format!("{QUEUE_ROOT}:{encoded_queue}")
}

/// Builds an item key for a queue position, from its encoded name.
#[must_use]
pub fn queue_item_key(encoded_queue: &str, index: u64) -> String {
    format!("{QUEUE_ROOT}:{encoded_queue}:{index}")
}

/// Builds the dispatcher event name for a queue event kind.
#[must_use]
pub fn queue_event_name(encoded_queue: &str, kind: &str) -> String {
    format!("{QUEUE_EVENT_ROOT}:{encoded_queue}:{kind}")
}

/// Builds the row key for an operation record.
#[must_use]
pub fn operation_key(op_id: &str) -> String {
    format!("{OP_TABLE}:{op_id}")
}
