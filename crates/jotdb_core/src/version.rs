//! Versioned operation log with undo/redo navigation.

use crate::cache::MemoryLimitedCache;
use crate::config::{CacheConfig, EvictionPolicy};
use crate::error::{CoreError, CoreResult};
use crate::keys::{operation_key, OP_TABLE};
use crate::operation::Operation;
use jotdb_storage::MemoryBackend;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;
use uuid::Uuid;

/// Prefix of the string returned when the log outgrows its limit.
pub const WARNING_PREFIX: &str = "[LocalVersionController] Warning: memory usage ";

/// Field of the manifest row holding the ordered operation ids.
const OPS_FIELD: &str = "ops";

/// A stored operation: the forward edit and, when derivable, its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    /// The edit that was applied.
    pub forward: Operation,
    /// The inverse edit, absent when the forward had nothing to restore.
    pub revert: Option<Operation>,
}

impl OperationRecord {
    /// Encodes the record as its stored row value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "forward": self.forward.to_value(),
            "revert": self.revert.as_ref().map(Operation::to_value),
        })
    }

    /// Decodes a stored row value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] when the forward operation is
    /// missing or malformed.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        let forward = value
            .get("forward")
            .ok_or_else(|| CoreError::invalid_format("operation record lacks a forward"))?;
        let revert = match value.get("revert") {
            None | Some(Value::Null) => None,
            Some(op) => Some(Operation::from_value(op)?),
        };
        Ok(Self {
            forward: Operation::from_value(forward)?,
            revert,
        })
    }
}

/// An ordered log of reversible operations with a movable cursor.
///
/// Operation rows live in a dedicated FIFO [`MemoryLimitedCache`] under
/// `"_Operation:<uuid>"`; the chronological manifest of ids lives at
/// `"_Operation"` and is pinned so it can never be evicted. The
/// `current_version` cursor names the operation that would next be
/// reverted; `None` means "before the first operation".
///
/// By default the log does not evict: its limit is a warning threshold, and
/// [`VersionLog::add_operation`] returns a warning string once the log's
/// bytes exceed it. A log built with [`VersionLog::with_cache_budget`]
/// additionally evicts its oldest records; evicted ids are removed from the
/// manifest, and losing the row under the cursor surfaces
/// [`CoreError::CurrentVersionEvicted`].
pub struct VersionLog {
    client: MemoryLimitedCache<MemoryBackend>,
    current: Option<String>,
    limit_mb: f64,
    /// Op ids recorded by the eviction hook, reconciled after each write.
    evicted: Rc<RefCell<Vec<String>>>,
}

impl VersionLog {
    /// Default warning threshold in mebibytes.
    pub const DEFAULT_LIMIT_MB: f64 = 128.0;

    /// Creates a log that warns past `limit_mb` but never evicts.
    #[must_use]
    pub fn new(limit_mb: f64) -> Self {
        Self::build(limit_mb, 0.0)
    }

    /// Creates a log whose cache evicts past `cache_budget_mb`, in addition
    /// to warning past `limit_mb`.
    #[must_use]
    pub fn with_cache_budget(limit_mb: f64, cache_budget_mb: f64) -> Self {
        Self::build(limit_mb, cache_budget_mb)
    }

    fn build(limit_mb: f64, cache_budget_mb: f64) -> Self {
        let config = CacheConfig::new()
            .max_memory_mb(cache_budget_mb)
            .policy(EvictionPolicy::Fifo)
            .pin(OP_TABLE);
        let mut client = MemoryLimitedCache::new(MemoryBackend::new(), config);

        let evicted: Rc<RefCell<Vec<String>>> = Rc::default();
        let recorder = Rc::clone(&evicted);
        let prefix = format!("{OP_TABLE}:");
        client.set_evict_hook(Box::new(move |key, _| {
            if let Some(op_id) = key.strip_prefix(prefix.as_str()) {
                recorder.borrow_mut().push(op_id.to_string());
            }
            Ok(())
        }));

        Self {
            client,
            current: None,
            limit_mb,
            evicted,
        }
    }

    /// Returns the warning threshold in mebibytes.
    #[must_use]
    pub fn limit_mb(&self) -> f64 {
        self.limit_mb
    }

    /// Returns the log's byte counter.
    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.client.bytes_used()
    }

    /// Returns the UUID of the operation the cursor stands on, or `None`
    /// before the first operation.
    #[must_use]
    pub fn current_version(&self) -> Option<String> {
        self.current.clone()
    }

    /// Returns the chronological list of operation ids.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn versions(&mut self) -> CoreResult<Vec<String>> {
        self.versions_raw()
    }

    /// Reads a stored record by id.
    ///
    /// # Errors
    ///
    /// Propagates backend failures and malformed rows.
    pub fn record(&mut self, op_id: &str) -> CoreResult<Option<OperationRecord>> {
        match self.client.get(&operation_key(op_id))? {
            Some(row) => Ok(Some(OperationRecord::from_value(&row)?)),
            None => Ok(None),
        }
    }

    /// Appends an operation after the cursor, discarding any redo branch.
    ///
    /// Steps: mint an id and write the record; truncate the manifest past
    /// the cursor (erasing the truncated rows); append the id and move the
    /// cursor onto it. Returns a warning string, prefixed
    /// [`WARNING_PREFIX`], when the log's bytes exceed its limit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CurrentVersionEvicted`] when a byte-bounded log
    /// evicted the row under the cursor while absorbing this write.
    pub fn add_operation(
        &mut self,
        forward: Operation,
        revert: Option<Operation>,
    ) -> CoreResult<Option<String>> {
        let op_id = Uuid::new_v4().to_string();
        let record = OperationRecord { forward, revert };
        self.client.set(&operation_key(&op_id), record.to_value())?;

        let mut ops = self.versions_raw()?;
        if let Some(cursor) = &self.current {
            if let Some(idx) = ops.iter().position(|id| id == cursor) {
                for dropped in ops.split_off(idx + 1) {
                    self.client.erase(&operation_key(&dropped))?;
                }
            }
        }
        ops.push(op_id.clone());
        self.set_versions(&ops)?;
        self.current = Some(op_id);
        self.reconcile_evictions()?;

        let used_mb = self.bytes_used() as f64 / (1024.0 * 1024.0);
        if used_mb > self.limit_mb {
            let message =
                format!("{WARNING_PREFIX}{used_mb:.1} MB exceeds limit of {} MB", self.limit_mb);
            warn!("{message}");
            return Ok(Some(message));
        }
        Ok(None)
    }

    /// Pops `n` operations out of the log.
    ///
    /// Each round removes the oldest operation, unless the oldest is the
    /// one under the cursor, in which case the newest goes instead. Rows
    /// whose record was already lost report `None`. When the cursor's
    /// operation is removed (or the cursor was unset), the cursor moves to
    /// the remaining tail, or to `None` on an empty log.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn pop_operation(
        &mut self,
        n: usize,
    ) -> CoreResult<Vec<(String, Option<OperationRecord>)>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut ops = self.versions_raw()?;
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let mut popped = Vec::new();
        for _ in 0..n.min(ops.len()) {
            let pop_idx = if self.current.as_deref() == Some(ops[0].as_str()) {
                ops.len() - 1
            } else {
                0
            };
            let op_id = ops.remove(pop_idx);
            let record = match self.client.get(&operation_key(&op_id))? {
                Some(row) => OperationRecord::from_value(&row).ok(),
                None => None,
            };
            self.client.erase(&operation_key(&op_id))?;
            popped.push((op_id, record));
        }
        self.set_versions(&ops)?;
        self.reconcile_evictions()?;

        match &self.current {
            Some(cursor) if ops.contains(cursor) => {}
            _ => self.current = ops.last().cloned(),
        }
        Ok(popped)
    }

    /// Applies the next operation's forward edit and advances the cursor.
    ///
    /// No-op when the cursor is already at the tail or the next record is
    /// unreadable. The cursor only advances if `apply` succeeds.
    ///
    /// # Errors
    ///
    /// Propagates backend failures and errors from `apply`.
    pub fn forward_one<F>(&mut self, mut apply: F) -> CoreResult<()>
    where
        F: FnMut(&Operation) -> CoreResult<()>,
    {
        let ops = self.versions_raw()?;
        let next_idx = usize::try_from(self.current_index(&ops) + 1).unwrap_or(usize::MAX);
        if next_idx >= ops.len() {
            return Ok(());
        }
        let op_id = ops[next_idx].clone();
        let Some(row) = self.client.get(&operation_key(&op_id))? else {
            return Ok(());
        };
        let Ok(record) = OperationRecord::from_value(&row) else {
            return Ok(());
        };

        apply(&record.forward)?;
        self.current = Some(op_id);
        Ok(())
    }

    /// Applies the current operation's revert edit and moves the cursor
    /// back one step.
    ///
    /// No-op when the cursor is at (or before) the first operation, or when
    /// the current record is unreadable or carries no revert. The cursor
    /// only moves if `apply` succeeds.
    ///
    /// # Errors
    ///
    /// Propagates backend failures and errors from `apply`.
    pub fn revert_one<F>(&mut self, mut apply: F) -> CoreResult<()>
    where
        F: FnMut(&Operation) -> CoreResult<()>,
    {
        let ops = self.versions_raw()?;
        let idx = self.current_index(&ops);
        if idx <= 0 {
            return Ok(());
        }
        let idx = idx as usize;
        let Some(row) = self.client.get(&operation_key(&ops[idx]))? else {
            return Ok(());
        };
        let Ok(record) = OperationRecord::from_value(&row) else {
            return Ok(());
        };
        let Some(revert) = record.revert else {
            return Ok(());
        };

        apply(&revert)?;
        self.current = Some(ops[idx - 1].clone());
        Ok(())
    }

    /// Steps the cursor forward or backward until it stands on the target
    /// operation, applying each traversed edit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownVersion`] when the target is not in the
    /// manifest; otherwise propagates errors from the traversal.
    pub fn to_version<F>(&mut self, target: &str, mut apply: F) -> CoreResult<()>
    where
        F: FnMut(&Operation) -> CoreResult<()>,
    {
        let ops = self.versions_raw()?;
        let Some(target_idx) = ops.iter().position(|id| id == target) else {
            return Err(CoreError::unknown_version(target));
        };
        let target_idx = target_idx as i64;

        let mut idx = self.current_index(&ops);
        while idx != target_idx {
            if idx < target_idx {
                self.forward_one(&mut apply)?;
                idx += 1;
            } else {
                self.revert_one(&mut apply)?;
                idx -= 1;
            }
        }
        Ok(())
    }

    /// Index of the cursor in `ops`, `-1` when unset or missing.
    fn current_index(&self, ops: &[String]) -> i64 {
        self.current
            .as_ref()
            .and_then(|cursor| ops.iter().position(|id| id == cursor))
            .map_or(-1, |idx| idx as i64)
    }

    fn versions_raw(&mut self) -> CoreResult<Vec<String>> {
        let Some(manifest) = self.client.get(OP_TABLE)? else {
            return Ok(Vec::new());
        };
        Ok(manifest
            .get(OPS_FIELD)
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn set_versions(&mut self, ops: &[String]) -> CoreResult<()> {
        self.client.set(OP_TABLE, json!({ OPS_FIELD: ops }))
    }

    /// Folds hook-recorded evictions back into the manifest.
    ///
    /// Eviction only happens while this log writes into its own cache, so
    /// this runs after every such write. Losing the row under the cursor
    /// leaves the cursor unset and reports the loss.
    fn reconcile_evictions(&mut self) -> CoreResult<()> {
        let mut lost_cursor: Option<String> = None;
        loop {
            let drained: Vec<String> = self.evicted.borrow_mut().drain(..).collect();
            if drained.is_empty() {
                break;
            }
            let mut ops = self.versions_raw()?;
            ops.retain(|id| !drained.contains(id));
            // this write can evict further rows; the loop drains them too
            self.set_versions(&ops)?;

            if let Some(cursor) = &self.current {
                if drained.contains(cursor) {
                    lost_cursor = Some(cursor.clone());
                    self.current = None;
                }
            }
        }
        match lost_cursor {
            Some(version) => Err(CoreError::current_version_evicted(version)),
            None => Ok(()),
        }
    }
}

impl Default for VersionLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jotdb_storage::KvBackend;
    use serde_json::json;

    fn set_op(key: &str, n: i64) -> Operation {
        Operation::Set {
            key: key.to_string(),
            value: json!(n),
        }
    }

    fn add(log: &mut VersionLog, key: &str, n: i64) -> String {
        log.add_operation(set_op(key, n), Some(Operation::Erase { key: key.into() }))
            .unwrap();
        log.current_version().unwrap()
    }

    #[test]
    fn add_moves_the_cursor() {
        let mut log = VersionLog::default();
        assert_eq!(log.current_version(), None);

        let v1 = add(&mut log, "a", 1);
        let v2 = add(&mut log, "b", 2);
        assert_ne!(v1, v2);
        assert_eq!(log.current_version(), Some(v2.clone()));
        assert_eq!(log.versions().unwrap(), vec![v1, v2]);
    }

    #[test]
    fn forward_and_revert_replay_the_recorded_edits() {
        let mut log = VersionLog::default();
        let v1 = add(&mut log, "a", 1);
        add(&mut log, "b", 2);

        let mut backend = MemoryBackend::new();
        // replay both forwards onto an empty backend
        log.to_version(&v1, |_| Ok(())).unwrap();
        log.forward_one(|op| crate::operation::apply_operation(&mut backend, op))
            .unwrap();
        assert_eq!(backend.get("b").unwrap(), Some(json!(2)));

        // and revert it again
        log.revert_one(|op| crate::operation::apply_operation(&mut backend, op))
            .unwrap();
        assert!(!backend.exists("b").unwrap());
        assert_eq!(log.current_version(), Some(v1));
    }

    #[test]
    fn revert_forward_returns_to_the_same_version() {
        let mut log = VersionLog::default();
        add(&mut log, "a", 1);
        let v2 = add(&mut log, "b", 2);

        log.revert_one(|_| Ok(())).unwrap();
        assert_ne!(log.current_version(), Some(v2.clone()));
        log.forward_one(|_| Ok(())).unwrap();
        assert_eq!(log.current_version(), Some(v2));
    }

    #[test]
    fn revert_without_predecessor_is_a_noop() {
        let mut log = VersionLog::default();
        let v1 = add(&mut log, "a", 1);
        log.revert_one(|_| panic!("must not be applied")).unwrap();
        assert_eq!(log.current_version(), Some(v1));
    }

    #[test]
    fn forward_at_the_tail_is_a_noop() {
        let mut log = VersionLog::default();
        let v1 = add(&mut log, "a", 1);
        log.forward_one(|_| panic!("must not be applied")).unwrap();
        assert_eq!(log.current_version(), Some(v1));
    }

    #[test]
    fn cursor_does_not_move_when_apply_fails() {
        let mut log = VersionLog::default();
        add(&mut log, "a", 1);
        let v2 = add(&mut log, "b", 2);

        let result = log.revert_one(|_| Err(CoreError::invalid_format("refused")));
        assert!(result.is_err());
        assert_eq!(log.current_version(), Some(v2));
    }

    #[test]
    fn adding_mid_history_truncates_the_redo_branch() {
        let mut log = VersionLog::default();
        let v1 = add(&mut log, "a", 1);
        let v2 = add(&mut log, "b", 2);
        let v3 = add(&mut log, "c", 3);

        log.to_version(&v1, |_| Ok(())).unwrap();
        let v4 = add(&mut log, "d", 4);

        assert_eq!(log.versions().unwrap(), vec![v1, v4]);
        // truncated rows are gone
        assert!(log.record(&v2).unwrap().is_none());
        assert!(log.record(&v3).unwrap().is_none());
    }

    #[test]
    fn to_version_rejects_unknown_targets() {
        let mut log = VersionLog::default();
        add(&mut log, "a", 1);
        let result = log.to_version("not-a-version", |_| Ok(()));
        assert!(matches!(result, Err(CoreError::UnknownVersion { .. })));
    }

    #[test]
    fn pop_takes_the_oldest_unless_it_is_current() {
        let mut log = VersionLog::default();
        let v1 = add(&mut log, "a", 1);
        let v2 = add(&mut log, "b", 2);
        let v3 = add(&mut log, "c", 3);

        // cursor on v3: oldest (v1) goes first
        let popped = log.pop_operation(1).unwrap();
        assert_eq!(popped[0].0, v1);
        assert_eq!(log.versions().unwrap(), vec![v2.clone(), v3.clone()]);

        // move the cursor onto the oldest remaining op: newest goes instead
        log.to_version(&v2, |_| Ok(())).unwrap();
        let popped = log.pop_operation(1).unwrap();
        assert_eq!(popped[0].0, v3);
        assert_eq!(log.versions().unwrap(), vec![v2.clone()]);
        assert_eq!(log.current_version(), Some(v2));
    }

    #[test]
    fn pop_fixes_a_dangling_cursor() {
        let mut log = VersionLog::default();
        let v1 = add(&mut log, "a", 1);
        let v2 = add(&mut log, "b", 2);

        // cursor on v2 (oldest is v1): popping twice removes v1 then,
        // with the cursor now on the oldest, v2 itself
        let popped = log.pop_operation(2).unwrap();
        assert_eq!(popped.len(), 2);
        assert_eq!(popped[0].0, v1);
        assert_eq!(popped[1].0, v2);
        assert!(log.versions().unwrap().is_empty());
        assert_eq!(log.current_version(), None);
    }

    #[test]
    fn pop_returns_records() {
        let mut log = VersionLog::default();
        add(&mut log, "a", 7);
        let popped = log.pop_operation(1).unwrap();
        let record = popped[0].1.as_ref().unwrap();
        assert_eq!(record.forward, set_op("a", 7));
    }

    #[test]
    fn pop_of_nothing() {
        let mut log = VersionLog::default();
        assert!(log.pop_operation(0).unwrap().is_empty());
        assert!(log.pop_operation(5).unwrap().is_empty());
    }

    #[test]
    fn warning_past_the_limit() {
        // ~200 B limit; the first op already exceeds it
        let mut log = VersionLog::new(200.0 / (1024.0 * 1024.0));
        let warning = log
            .add_operation(
                Operation::Set {
                    key: "k".into(),
                    value: json!("x".repeat(512)),
                },
                None,
            )
            .unwrap();
        assert!(warning.unwrap().starts_with(WARNING_PREFIX));
    }

    #[test]
    fn no_warning_under_the_limit() {
        let mut log = VersionLog::default();
        let warning = log.add_operation(set_op("k", 1), None).unwrap();
        assert!(warning.is_none());
    }

    #[test]
    fn bounded_log_drops_evicted_ops_from_the_manifest() {
        // room for roughly one large record besides the manifest
        let mut log = VersionLog::with_cache_budget(128.0, 1500.0 / (1024.0 * 1024.0));

        let mut survivors = Vec::new();
        for n in 0..4 {
            log.add_operation(
                Operation::Set {
                    key: format!("k{n}"),
                    value: json!("x".repeat(600)),
                },
                None,
            )
            .unwrap();
            survivors = log.versions().unwrap();
        }

        // older ops fell off; every listed id still has its row
        assert!(survivors.len() < 4);
        for id in survivors {
            assert!(log.record(&id).unwrap().is_some());
        }
    }

    #[test]
    fn losing_the_cursor_row_is_surfaced() {
        // budget too small to hold even one record
        let mut log = VersionLog::with_cache_budget(128.0, 300.0 / (1024.0 * 1024.0));
        let result = log.add_operation(
            Operation::Set {
                key: "k".into(),
                value: json!("x".repeat(2048)),
            },
            None,
        );
        assert!(matches!(result, Err(CoreError::CurrentVersionEvicted { .. })));
        assert_eq!(log.current_version(), None);
    }
}
