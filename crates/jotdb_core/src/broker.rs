//! Named-queue message broker.

use crate::cache::MemoryLimitedCache;
use crate::config::CacheConfig;
use crate::dispatcher::{EventDispatcher, Listener};
use crate::error::CoreResult;
use crate::keys::{
    b64url_decode, b64url_encode, listener_event_of, queue_event_name, queue_item_key,
    queue_meta_key, QUEUE_EVENT_ROOT, QUEUE_ROOT,
};
use jotdb_storage::MemoryBackend;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Name of the queue used when none is given.
pub const DEFAULT_QUEUE: &str = "default";

/// The kinds of queue event a broker emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    /// A message was appended.
    Pushed,
    /// A message was removed from the head.
    Popped,
    /// A pop left the queue empty.
    Empty,
    /// The queue and its meta were cleared.
    Cleared,
}

impl QueueEvent {
    /// Returns the event kind's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pushed => "pushed",
            Self::Popped => "popped",
            Self::Empty => "empty",
            Self::Cleared => "cleared",
        }
    }
}

/// A FIFO message broker over named queues.
///
/// Messages live in a [`MemoryLimitedCache`] under keys
/// `"_MessageQueue:<b64url(queue)>:<index>"`, with a per-queue meta row
/// `{head, tail}` at `"_MessageQueue:<b64url(queue)>"`. Because the storage
/// is an evictable cache, old items may disappear; the pop path skips such
/// holes and keeps the head moving. Messages are never reordered.
///
/// Queue events (`pushed`, `popped`, `empty`, `cleared`) are dispatched
/// through an [`EventDispatcher`] under names
/// `"MQE:<b64url(queue)>:<kind>"`. Queues with different names share no
/// state, and a failing listener on one queue never blocks another.
///
/// # Example
///
/// ```
/// use jotdb_core::{CacheConfig, MessageBroker, DEFAULT_QUEUE};
/// use serde_json::json;
///
/// let mut broker = MessageBroker::new(CacheConfig::default());
/// broker.push(json!({"n": 1}), DEFAULT_QUEUE).unwrap();
/// broker.push(json!({"n": 2}), DEFAULT_QUEUE).unwrap();
///
/// assert_eq!(broker.queue_size(DEFAULT_QUEUE).unwrap(), 2);
/// assert_eq!(broker.pop(DEFAULT_QUEUE).unwrap(), Some(json!({"n": 1})));
/// ```
pub struct MessageBroker {
    cache: MemoryLimitedCache<MemoryBackend>,
    dispatcher: EventDispatcher,
    /// encoded name → original name, for `list_queues`
    names: HashMap<String, String>,
}

impl MessageBroker {
    /// Creates a broker over a fresh private backend.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: MemoryLimitedCache::new(MemoryBackend::new(), config),
            dispatcher: EventDispatcher::new(),
            names: HashMap::new(),
        }
    }

    /// Returns the broker's dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Returns the cache's byte counter for the stored messages.
    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.cache.bytes_used()
    }

    /// Appends a message at the queue's tail and dispatches `pushed`.
    ///
    /// Returns the stored item's key.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn push(&mut self, message: Value, queue: &str) -> CoreResult<String> {
        let enc = self.encoded(queue);
        let (head, tail) = self.load_meta(&enc)?;

        let key = queue_item_key(&enc, tail);
        self.cache.set(&key, message.clone())?;
        self.save_meta(&enc, head, tail + 1)?;

        self.dispatch_queue_event(&enc, QueueEvent::Pushed, Some(&json!({ "message": message })));
        Ok(key)
    }

    /// Reads or removes the message at the queue's head.
    ///
    /// The head is first advanced past holes (slots whose item was evicted).
    /// On an empty queue, returns `(None, None)`. With `peek` the message is
    /// returned without mutation; otherwise the item is erased, the head
    /// advanced, `popped` dispatched, and, if the queue is now empty,
    /// `empty` dispatched as well.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn pop_item(
        &mut self,
        queue: &str,
        peek: bool,
    ) -> CoreResult<(Option<String>, Option<Value>)> {
        let enc = self.encoded(queue);
        let (original_head, tail) = self.load_meta(&enc)?;
        let mut head = original_head;

        let mut front: Option<(String, Value)> = None;
        while head < tail {
            let key = queue_item_key(&enc, head);
            match self.cache.get(&key)? {
                Some(message) => {
                    front = Some((key, message));
                    break;
                }
                // hole left by eviction
                None => head += 1,
            }
        }

        let Some((key, message)) = front else {
            if head != original_head {
                self.save_meta(&enc, head, tail)?;
            }
            return Ok((None, None));
        };

        if peek {
            if head != original_head {
                self.save_meta(&enc, head, tail)?;
            }
            return Ok((Some(key), Some(message)));
        }

        self.cache.erase(&key)?;
        head += 1;
        self.save_meta(&enc, head, tail)?;

        self.dispatch_queue_event(&enc, QueueEvent::Popped, Some(&json!({ "message": message })));
        if head == tail {
            self.dispatch_queue_event(&enc, QueueEvent::Empty, None);
        }
        Ok((Some(key), Some(message)))
    }

    /// Removes and returns the head message, or `None` if the queue is
    /// empty.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn pop(&mut self, queue: &str) -> CoreResult<Option<Value>> {
        Ok(self.pop_item(queue, false)?.1)
    }

    /// Returns the head message without removing it.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn peek(&mut self, queue: &str) -> CoreResult<Option<Value>> {
        Ok(self.pop_item(queue, true)?.1)
    }

    /// Returns the queue's size as recorded by its meta (`tail - head`).
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn queue_size(&mut self, queue: &str) -> CoreResult<u64> {
        let enc = self.encoded(queue);
        let (head, tail) = self.load_meta(&enc)?;
        Ok(tail - head)
    }

    /// Erases every item and the meta of a queue, then dispatches
    /// `cleared`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn clear(&mut self, queue: &str) -> CoreResult<()> {
        let enc = self.encoded(queue);
        let pattern = format!("{}:*", queue_meta_key(&enc));
        for key in self.cache.keys(&pattern)? {
            self.cache.erase(&key)?;
        }
        self.cache.erase(&queue_meta_key(&enc))?;
        self.dispatch_queue_event(&enc, QueueEvent::Cleared, None);
        Ok(())
    }

    /// Subscribes a callback to one queue event kind.
    ///
    /// Returns the listener id, minting one when none is given.
    pub fn add_listener(
        &mut self,
        queue: &str,
        callback: Listener,
        kind: QueueEvent,
        listener_id: Option<String>,
    ) -> String {
        let enc = self.encoded(queue);
        self.dispatcher
            .set_listener(&queue_event_name(&enc, kind.as_str()), callback, listener_id)
    }

    /// Removes listeners by raw id. Returns how many were removed.
    pub fn remove_listener(&self, listener_id: &str) -> usize {
        self.dispatcher.remove_listener(listener_id)
    }

    /// Returns the listener keys registered on this broker, optionally
    /// filtered by queue and/or event kind.
    #[must_use]
    pub fn list_listeners(&self, queue: Option<&str>, kind: Option<QueueEvent>) -> Vec<String> {
        let queue_enc = queue.map(b64url_encode);
        self.dispatcher
            .listeners()
            .into_iter()
            .filter(|key| {
                let Some(event) = listener_event_of(key) else {
                    return false;
                };
                let mut parts = event.splitn(3, ':');
                if parts.next() != Some(QUEUE_EVENT_ROOT) {
                    return false;
                }
                let enc = parts.next();
                let event_kind = parts.next();
                queue_enc.as_deref().map_or(true, |q| enc == Some(q))
                    && kind.map_or(true, |k| event_kind == Some(k.as_str()))
            })
            .collect()
    }

    /// Returns the distinct queue names derived from stored meta and item
    /// keys, sorted. Names that cannot be translated back are returned in
    /// their encoded form.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn list_queues(&self) -> CoreResult<Vec<String>> {
        let mut encoded: BTreeSet<String> = BTreeSet::new();
        for key in self.cache.keys(&format!("{QUEUE_ROOT}:*"))? {
            if let Some(enc) = key.split(':').nth(1) {
                encoded.insert(enc.to_string());
            }
        }
        Ok(encoded.into_iter().map(|enc| self.decoded(&enc)).collect())
    }

    /// Encodes a queue name once and remembers the translation.
    fn encoded(&mut self, queue: &str) -> String {
        let enc = b64url_encode(queue);
        self.names
            .entry(enc.clone())
            .or_insert_with(|| queue.to_string());
        enc
    }

    fn decoded(&self, encoded: &str) -> String {
        self.names
            .get(encoded)
            .cloned()
            .or_else(|| b64url_decode(encoded))
            .unwrap_or_else(|| encoded.to_string())
    }

    fn dispatch_queue_event(&self, enc: &str, kind: QueueEvent, payload: Option<&Value>) {
        self.dispatcher
            .dispatch(&queue_event_name(enc, kind.as_str()), payload);
    }

    /// Reads a queue's meta, healing corrupt state.
    ///
    /// Meta must hold integers with `0 ≤ head ≤ tail`; any violation resets
    /// it to `{0, 0}` and persists the reset. A missing meta reads as
    /// `(0, 0)` without being written (meta is created lazily on push).
    fn load_meta(&mut self, enc: &str) -> CoreResult<(u64, u64)> {
        let Some(meta) = self.cache.get(&queue_meta_key(enc))? else {
            return Ok((0, 0));
        };

        let head = meta.get("head").and_then(Value::as_i64);
        let tail = meta.get("tail").and_then(Value::as_i64);
        match (head, tail) {
            (Some(head), Some(tail)) if 0 <= head && head <= tail => {
                Ok((head as u64, tail as u64))
            }
            _ => {
                debug!(queue = %self.decoded(enc), "healed corrupt queue meta");
                self.save_meta(enc, 0, 0)?;
                Ok((0, 0))
            }
        }
    }

    fn save_meta(&mut self, enc: &str, head: u64, tail: u64) -> CoreResult<()> {
        self.cache
            .set(&queue_meta_key(enc), json!({ "head": head, "tail": tail }))
    }
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
