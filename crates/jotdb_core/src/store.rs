//! Store façade.

use crate::broker::MessageBroker;
use crate::config::CacheConfig;
use crate::dispatcher::{EventDispatcher, Listener};
use crate::encryptor::{unwrap_ciphertext, wrap_ciphertext, Encryptor};
use crate::error::{CoreError, CoreResult};
use crate::operation::{apply_operation, Operation};
use crate::version::VersionLog;
use jotdb_storage::{KvBackend, MemoryBackend};
use serde_json::{json, Value};
use std::path::Path;
use tracing::warn;

/// The high-level key–value store.
///
/// A store composes one backend, an event dispatcher, a version log, and a
/// message broker. Every mutation runs the same pipeline: version
/// bookkeeping (when version control is on), the backend write, then event
/// dispatch under the operation's tag. An observer therefore never sees an
/// event for a write that has not reached the backend.
///
/// Mutations return `bool` and reads return `Option`; internal failures are
/// logged and translated, never thrown at the caller. Only the version
/// navigation APIs surface typed errors.
///
/// # Example
///
/// ```
/// use jotdb_core::Store;
/// use serde_json::json;
///
/// let mut store = Store::new();
/// assert!(store.set("alpha", json!({"info": "first"})));
/// assert_eq!(store.get("alpha"), Some(json!({"info": "first"})));
/// assert!(store.erase("alpha"));
/// assert_eq!(store.get("alpha"), None);
/// ```
///
/// # Replication
///
/// There is no dedicated follower API: a follower subscribes to the `set`
/// and `erase` events and mirrors them into its own backend.
///
/// ```
/// use jotdb_core::Store;
/// use jotdb_storage::{KvBackend, MemoryBackend};
/// use serde_json::json;
/// use std::cell::RefCell;
///
/// let mut source = Store::new();
/// let follower = MemoryBackend::new();
///
/// let mirror = RefCell::new(follower.clone());
/// source.on("set", move |payload| {
///     let payload = payload.expect("set carries a payload");
///     let key = payload["key"].as_str().expect("key is a string");
///     mirror.borrow_mut().set(key, payload["value"].clone())?;
///     Ok(())
/// });
///
/// source.set("alpha", json!(1));
/// assert!(follower.exists("alpha").unwrap());
/// ```
pub struct Store {
    conn: Box<dyn KvBackend>,
    dispatcher: EventDispatcher,
    versions: VersionLog,
    broker: MessageBroker,
    version_control: bool,
    version_limit_mb: f64,
    encryptor: Option<Box<dyn Encryptor>>,
}

/// Builder for [`Store`].
pub struct StoreBuilder {
    backend: Option<Box<dyn KvBackend>>,
    version_control: bool,
    version_limit_mb: f64,
    encryptor: Option<Box<dyn Encryptor>>,
}

impl StoreBuilder {
    fn new() -> Self {
        Self {
            backend: None,
            version_control: false,
            version_limit_mb: VersionLog::DEFAULT_LIMIT_MB,
            encryptor: None,
        }
    }

    /// Uses the given backend instead of a fresh private one.
    #[must_use]
    pub fn backend(mut self, backend: impl KvBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Turns operation recording and undo/redo navigation on or off.
    #[must_use]
    pub fn version_control(mut self, on: bool) -> Self {
        self.version_control = on;
        self
    }

    /// Sets the version log's warning threshold in mebibytes.
    #[must_use]
    pub fn version_limit_mb(mut self, mb: f64) -> Self {
        self.version_limit_mb = mb;
        self
    }

    /// Encrypts written values with the given encryptor.
    #[must_use]
    pub fn encryptor(mut self, encryptor: impl Encryptor + 'static) -> Self {
        self.encryptor = Some(Box::new(encryptor));
        self
    }

    /// Builds the store.
    #[must_use]
    pub fn build(self) -> Store {
        Store {
            conn: self
                .backend
                .unwrap_or_else(|| Box::new(MemoryBackend::new())),
            dispatcher: EventDispatcher::new(),
            versions: VersionLog::new(self.version_limit_mb),
            broker: MessageBroker::new(CacheConfig::default()),
            version_control: self.version_control,
            version_limit_mb: self.version_limit_mb,
            encryptor: self.encryptor,
        }
    }
}

impl Store {
    /// Creates a store over a fresh private backend, with version control
    /// off and no encryptor.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Returns the store's backend.
    #[must_use]
    pub fn backend(&self) -> &dyn KvBackend {
        self.conn.as_ref()
    }

    /// Returns true if version control is on.
    #[must_use]
    pub fn version_control(&self) -> bool {
        self.version_control
    }

    /// Replaces the backend.
    ///
    /// The dispatcher, version log, and broker are rebuilt so listeners,
    /// history, and queues never leak across backends.
    pub fn switch_backend(&mut self, backend: Box<dyn KvBackend>) {
        self.dispatcher = EventDispatcher::new();
        self.versions = VersionLog::new(self.version_limit_mb);
        self.broker = MessageBroker::new(CacheConfig::default());
        self.conn = backend;
    }

    // ---- mutations ----------------------------------------------------

    /// Writes a key. Returns false on failure.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        self.mutate(Operation::Set {
            key: key.to_string(),
            value,
        })
    }

    /// Erases a key. Returns false if it was absent or the erase failed;
    /// the `erase` event is dispatched either way.
    pub fn erase(&mut self, key: &str) -> bool {
        self.mutate(Operation::Erase {
            key: key.to_string(),
        })
    }

    /// Removes every key. Returns false on failure.
    pub fn clean(&mut self) -> bool {
        self.mutate(Operation::Clean)
    }

    /// Reads a JSON dump file and merges it. Returns false on failure.
    pub fn load_file(&mut self, path: &Path) -> bool {
        self.mutate(Operation::Load {
            path: path.display().to_string(),
        })
    }

    /// Merges a serialized JSON object. Returns false on failure.
    pub fn loads(&mut self, json: &str) -> bool {
        self.mutate(Operation::Loads {
            body: json.to_string(),
        })
    }

    // ---- reads --------------------------------------------------------

    /// Returns whether a key exists, or `None` on failure.
    #[must_use]
    pub fn exists(&self, key: &str) -> Option<bool> {
        match self.conn.exists(key) {
            Ok(present) => Some(present),
            Err(error) => {
                warn!(%error, key, "exists failed");
                None
            }
        }
    }

    /// Reads a value.
    ///
    /// When an encryptor is configured and the stored value has the
    /// `{"rjson": <ciphertext>}` shape, the ciphertext is decrypted and
    /// reparsed; anything else is returned verbatim. `None` on absence or
    /// failure.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.read_decrypted(key) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, key, "get failed");
                None
            }
        }
    }

    /// Returns the keys matching a glob pattern, or `None` on failure.
    #[must_use]
    pub fn keys(&self, pattern: &str) -> Option<Vec<String>> {
        match self.conn.keys(pattern) {
            Ok(keys) => Some(keys),
            Err(error) => {
                warn!(%error, pattern, "keys failed");
                None
            }
        }
    }

    /// Serializes the whole store as a JSON object string, decrypting
    /// wrapped values. `None` on failure.
    #[must_use]
    pub fn dumps(&self) -> Option<String> {
        match self.dumps_decrypted() {
            Ok(dump) => Some(dump),
            Err(error) => {
                warn!(%error, "dumps failed");
                None
            }
        }
    }

    /// Writes the backend's raw dump to a file. Returns false on failure.
    pub fn dump_file(&self, path: &Path) -> bool {
        match self.conn.dump_file(path) {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, path = %path.display(), "dump_file failed");
                false
            }
        }
    }

    // ---- version navigation -------------------------------------------

    /// Returns the UUID of the operation the cursor stands on.
    #[must_use]
    pub fn current_version(&self) -> Option<String> {
        self.versions.current_version()
    }

    /// Returns the chronological list of recorded operation ids.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn versions(&mut self) -> CoreResult<Vec<String>> {
        self.versions.versions()
    }

    /// Undoes the current operation by replaying its revert locally (no
    /// events, no re-recording).
    ///
    /// # Errors
    ///
    /// Propagates navigation and backend failures.
    pub fn revert_one(&mut self) -> CoreResult<()> {
        let Self { conn, versions, .. } = self;
        versions.revert_one(|op| apply_operation(conn.as_mut(), op))
    }

    /// Redoes the next operation by replaying its forward edit locally.
    ///
    /// # Errors
    ///
    /// Propagates navigation and backend failures.
    pub fn forward_one(&mut self) -> CoreResult<()> {
        let Self { conn, versions, .. } = self;
        versions.forward_one(|op| apply_operation(conn.as_mut(), op))
    }

    /// Steps to an arbitrary recorded version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownVersion`] for an unrecorded target;
    /// otherwise propagates navigation and backend failures.
    pub fn to_version(&mut self, version: &str) -> CoreResult<()> {
        let Self { conn, versions, .. } = self;
        versions.to_version(version, |op| apply_operation(conn.as_mut(), op))
    }

    // ---- events -------------------------------------------------------

    /// Registers a closure for an event (mutations dispatch under their
    /// operation tag: `set`, `erase`, `clean`, `load`, `loads`). Returns
    /// the listener id.
    pub fn on<F>(&self, event_name: &str, callback: F) -> String
    where
        F: Fn(Option<&Value>) -> CoreResult<()> + 'static,
    {
        self.dispatcher.on(event_name, callback)
    }

    /// Registers a listener, optionally under a caller-chosen id.
    pub fn set_listener(
        &self,
        event_name: &str,
        listener: Listener,
        listener_id: Option<String>,
    ) -> String {
        self.dispatcher.set_listener(event_name, listener, listener_id)
    }

    /// Removes listeners by raw id. Returns how many were removed.
    pub fn remove_listener(&self, listener_id: &str) -> usize {
        self.dispatcher.remove_listener(listener_id)
    }

    /// Returns the callbacks registered under a raw listener id.
    #[must_use]
    pub fn get_event(&self, listener_id: &str) -> Vec<Listener> {
        self.dispatcher.get_event(listener_id)
    }

    /// Returns every listener key.
    #[must_use]
    pub fn listeners(&self) -> Vec<String> {
        self.dispatcher.listeners()
    }

    /// Removes every listener.
    pub fn clear_listeners(&self) {
        self.dispatcher.clear()
    }

    /// Dispatches an event to its listeners.
    pub fn dispatch(&self, event_name: &str, payload: Option<&Value>) {
        self.dispatcher.dispatch(event_name, payload)
    }

    // ---- queues -------------------------------------------------------

    /// Returns the store's message broker.
    pub fn broker(&mut self) -> &mut MessageBroker {
        &mut self.broker
    }

    // ---- pipeline -----------------------------------------------------

    fn mutate(&mut self, forward: Operation) -> bool {
        if self.version_control {
            if let Err(error) = self.record_version(&forward) {
                warn!(%error, op = forward.tag(), "version bookkeeping failed");
                return false;
            }
        }
        match self.edit_with_events(&forward) {
            Ok(applied) => applied,
            Err(error) => {
                warn!(%error, op = forward.tag(), "mutation failed");
                false
            }
        }
    }

    fn record_version(&mut self, forward: &Operation) -> CoreResult<()> {
        let revert = self.derive_revert(forward)?;
        // over-limit warnings are logged by the version log itself
        let _warning = self.versions.add_operation(forward.clone(), revert)?;
        Ok(())
    }

    /// Computes the inverse of an operation against the current state.
    fn derive_revert(&self, forward: &Operation) -> CoreResult<Option<Operation>> {
        Ok(match forward {
            Operation::Set { key, .. } => {
                if self.conn.exists(key)? {
                    self.read_decrypted(key)?.map(|prior| Operation::Set {
                        key: key.clone(),
                        value: prior,
                    })
                } else {
                    Some(Operation::Erase { key: key.clone() })
                }
            }
            Operation::Erase { key } => {
                self.read_decrypted(key)?.map(|prior| Operation::Set {
                    key: key.clone(),
                    value: prior,
                })
            }
            Operation::Clean | Operation::Load { .. } | Operation::Loads { .. } => {
                Some(Operation::Loads {
                    body: self.dumps_decrypted()?,
                })
            }
        })
    }

    /// Applies an operation to the backend and dispatches its event.
    ///
    /// The event always fires after the backend call; an erase of an
    /// absent key still dispatches `erase` but reports false.
    fn edit_with_events(&mut self, op: &Operation) -> CoreResult<bool> {
        match op {
            Operation::Set { key, value } => {
                let stored = match &self.encryptor {
                    Some(encryptor) => {
                        wrap_ciphertext(encryptor.encrypt_string(&value.to_string())?)
                    }
                    None => value.clone(),
                };
                self.conn.set(key, stored)?;
                self.dispatcher
                    .dispatch("set", Some(&json!({ "key": key, "value": value })));
            }
            Operation::Erase { key } => {
                let existed = self.conn.erase(key)?;
                self.dispatcher
                    .dispatch("erase", Some(&json!({ "key": key })));
                return Ok(existed);
            }
            Operation::Clean => {
                self.conn.clean()?;
                self.dispatcher.dispatch("clean", None);
            }
            Operation::Load { path } => {
                self.conn.load_file(Path::new(path))?;
                self.dispatcher
                    .dispatch("load", Some(&json!({ "path": path })));
            }
            Operation::Loads { body } => {
                self.conn.loads(body)?;
                self.dispatcher
                    .dispatch("loads", Some(&json!({ "json": body })));
            }
        }
        Ok(true)
    }

    fn read_decrypted(&self, key: &str) -> CoreResult<Option<Value>> {
        let Some(value) = self.conn.get(key)? else {
            return Ok(None);
        };
        if let Some(encryptor) = &self.encryptor {
            if let Some(ciphertext) = unwrap_ciphertext(&value) {
                let plaintext = encryptor.decrypt_string(ciphertext)?;
                let parsed: Value = serde_json::from_str(&plaintext).map_err(|e| {
                    CoreError::invalid_format(format!("decrypted payload: {e}"))
                })?;
                return Ok(Some(parsed));
            }
        }
        Ok(Some(value))
    }

    fn dumps_decrypted(&self) -> CoreResult<String> {
        let mut members = serde_json::Map::new();
        for key in self.conn.keys("*")? {
            if let Some(value) = self.read_decrypted(&key)? {
                members.insert(key, value);
            }
        }
        Ok(Value::Object(members).to_string())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn set_get_erase() {
        let mut store = Store::new();
        assert!(store.set("alpha", json!({"info": "first"})));
        assert_eq!(store.exists("alpha"), Some(true));
        assert_eq!(store.get("alpha"), Some(json!({"info": "first"})));

        assert!(store.erase("alpha"));
        assert_eq!(store.get("alpha"), None);
    }

    #[test]
    fn erase_of_absent_key_returns_false() {
        let mut store = Store::new();
        assert!(!store.erase("missing"));
    }

    #[test]
    fn keys_with_patterns() {
        let mut store = Store::new();
        store.set("alpha", json!(1));
        store.set("abeta", json!(2));
        store.set("gamma", json!(3));

        let mut keys = store.keys("a*").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["abeta", "alpha"]);
    }

    #[test]
    fn dumps_loads_roundtrip() {
        let mut store = Store::new();
        store.set("a", json!({"x": 1}));
        store.set("b", json!([1, 2]));

        let dump = store.dumps().unwrap();
        assert!(store.clean());
        assert_eq!(store.keys("*").unwrap().len(), 0);

        assert!(store.loads(&dump));
        assert_eq!(store.get("a"), Some(json!({"x": 1})));
        assert_eq!(store.get("b"), Some(json!([1, 2])));
    }

    #[test]
    fn loads_of_invalid_json_fails() {
        let mut store = Store::new();
        assert!(!store.loads("not json at all"));
        assert!(!store.loads("[1, 2, 3]"));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut store = Store::new();
        store.set("k", json!({"deep": [true, null]}));
        assert!(store.dump_file(&path));

        let mut other = Store::new();
        assert!(other.load_file(&path));
        assert_eq!(other.get("k"), Some(json!({"deep": [true, null]})));
    }

    #[test]
    fn load_file_of_missing_path_fails() {
        let mut store = Store::new();
        assert!(!store.load_file(Path::new("/definitely/not/here.json")));
    }

    #[test]
    fn events_fire_after_the_backend_write() {
        let shared = MemoryBackend::new();
        let store = Store::builder().backend(shared.clone()).build();

        let observed: Rc<RefCell<Vec<bool>>> = Rc::default();
        let observed_in = Rc::clone(&observed);
        let probe = shared.clone();
        store.on("set", move |payload| {
            let key = payload.unwrap()["key"].as_str().unwrap().to_string();
            // the write must already be visible in the backend
            observed_in.borrow_mut().push(probe.exists(&key)?);
            Ok(())
        });

        let mut store = store;
        store.set("alpha", json!(1));
        assert_eq!(*observed.borrow(), vec![true]);
    }

    #[test]
    fn erase_event_carries_the_key() {
        let mut store = Store::new();
        let seen: Rc<RefCell<Vec<Value>>> = Rc::default();
        let seen_in = Rc::clone(&seen);
        store.on("erase", move |payload| {
            seen_in.borrow_mut().push(payload.unwrap().clone());
            Ok(())
        });

        store.set("k", json!(1));
        store.erase("k");
        assert_eq!(*seen.borrow(), vec![json!({"key": "k"})]);
    }

    #[test]
    fn missed_erase_still_dispatches() {
        let mut store = Store::new();
        let fired = Rc::new(RefCell::new(0u32));
        let fired_in = Rc::clone(&fired);
        store.on("erase", move |_| {
            *fired_in.borrow_mut() += 1;
            Ok(())
        });

        assert!(!store.erase("missing"));
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn version_navigation_round_trip() {
        let mut store = Store::builder().version_control(true).build();
        store.set("a", json!(1));
        let v1 = store.current_version().unwrap();
        store.set("a", json!(2));

        store.revert_one().unwrap();
        assert_eq!(store.get("a"), Some(json!(1)));

        store.forward_one().unwrap();
        assert_eq!(store.get("a"), Some(json!(2)));

        store.to_version(&v1).unwrap();
        assert_eq!(store.get("a"), Some(json!(1)));
    }

    #[test]
    fn revert_stops_before_the_first_operation() {
        let mut store = Store::builder().version_control(true).build();
        store.set("fresh", json!(1));
        store.set("fresh", json!(2));
        store.revert_one().unwrap();
        assert_eq!(store.get("fresh"), Some(json!(1)));
        // the first set has no predecessor, so revert stops there
        store.revert_one().unwrap();
        assert_eq!(store.get("fresh"), Some(json!(1)));
    }

    #[test]
    fn no_versions_recorded_when_control_is_off() {
        let mut store = Store::new();
        store.set("a", json!(1));
        assert_eq!(store.current_version(), None);
        assert!(store.versions().unwrap().is_empty());
    }

    #[test]
    fn to_version_with_unknown_uuid_errors() {
        let mut store = Store::builder().version_control(true).build();
        store.set("a", json!(1));
        assert!(matches!(
            store.to_version("11111111-2222-3333-4444-555555555555"),
            Err(CoreError::UnknownVersion { .. })
        ));
    }

    #[test]
    fn switch_backend_resets_collaborators() {
        let mut store = Store::builder().version_control(true).build();
        store.on("set", |_| Ok(()));
        store.set("a", json!(1));
        store.broker().push(json!(1), "q").unwrap();

        store.switch_backend(Box::new(MemoryBackend::new()));

        assert!(store.listeners().is_empty());
        assert_eq!(store.current_version(), None);
        assert_eq!(store.broker().queue_size("q").unwrap(), 0);
        // and the data of the old backend is gone with it
        assert_eq!(store.exists("a"), Some(false));
    }

    #[test]
    fn shared_backends_see_each_other() {
        let shared = MemoryBackend::shared("store-tests-shared");
        let mut left = Store::builder().backend(shared.clone()).build();
        let right = Store::builder().backend(shared).build();

        left.set("k", json!(42));
        assert_eq!(right.get("k"), Some(json!(42)));
    }

    #[test]
    fn listener_failure_does_not_fail_the_mutation() {
        let mut store = Store::new();
        store.on("set", |_| Err(CoreError::listener("nope")));
        assert!(store.set("k", json!(1)));
        assert_eq!(store.get("k"), Some(json!(1)));
    }
}
