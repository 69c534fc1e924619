//! The call tracker, a passive append-only ledger of invocations.
//!
//! Every dispatch opens exactly one [`InvocationRecord`] and closes it once.
//! Records link to their parent invocation, which yields the call tree used
//! for the execution report. The tracker enforces nothing; depth limits are
//! the dispatcher's job.
//!
//! Concurrent `open`/`close` from parallel invocations is safe: ids come from
//! an atomic sequence and the ledger sits behind a mutex that is only held for
//! the duration of a single append or update.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::{CallId, CapabilityResult, CapabilityStatus};
use crate::error::{CapabilityError, ErrorCategory};
use crate::report::CallReport;

/// Process-wide id sequence; ids stay unique across trackers.
static NEXT_CALL_SEQ: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Running,
    Success,
    Error,
    Cancelled,
}

/// One capability invocation in the call tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub call_id: CallId,
    /// `None` only for calls issued directly by the user-facing loop.
    pub parent_call_id: Option<CallId>,
    pub depth: u32,
    pub capability_name: String,
    /// Arguments as given by the caller, before validation.
    pub arguments: serde_json::Value,
    pub status: RecordStatus,
    pub result: Option<CapabilityResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl InvocationRecord {
    pub fn is_open(&self) -> bool {
        self.status == RecordStatus::Running
    }

    /// Wall-clock duration in seconds, once finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    pub fn status_message(&self) -> &str {
        self.result
            .as_ref()
            .map(|r| r.status_message.as_str())
            .unwrap_or("running")
    }

    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.result.as_ref().and_then(|r| r.category())
    }
}

#[derive(Default)]
struct Ledger {
    records: Vec<InvocationRecord>,
    index: HashMap<CallId, usize>,
}

/// Ledger of every invocation made while answering one request.
#[derive(Default)]
pub struct CallTracker {
    ledger: Mutex<Ledger>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        // Each critical section is a single push or field update, so a
        // poisoned ledger is still consistent.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a record under `parent` and return its fresh id.
    ///
    /// The depth is derived from the parent's record, so the
    /// `depth == parent.depth + 1` invariant holds by construction.
    pub fn open(
        &self,
        parent: Option<&CallId>,
        capability_name: &str,
        arguments: serde_json::Value,
    ) -> CallId {
        let seq = NEXT_CALL_SEQ.fetch_add(1, Ordering::Relaxed);
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let call_id = CallId(format!("{capability_name}_{seq}_{}", &suffix[..6]));

        let mut ledger = self.ledger();
        let (parent_call_id, depth) = match parent {
            None => (None, 0),
            Some(p) => match ledger.index.get(p) {
                Some(&i) => (Some(p.clone()), ledger.records[i].depth + 1),
                None => {
                    warn!(parent = %p, capability = capability_name, "Parent call not in ledger, recording as root");
                    (None, 0)
                }
            },
        };

        let index = ledger.records.len();
        ledger.index.insert(call_id.clone(), index);
        ledger.records.push(InvocationRecord {
            call_id: call_id.clone(),
            parent_call_id,
            depth,
            capability_name: capability_name.to_string(),
            arguments,
            status: RecordStatus::Running,
            result: None,
            started_at: Utc::now(),
            finished_at: None,
        });
        debug!(call_id = %call_id, capability = capability_name, depth, "Opened invocation");
        call_id
    }

    /// Record the final result of an open invocation.
    pub fn close(&self, call_id: &CallId, result: CapabilityResult) {
        let mut ledger = self.ledger();
        let Some(&i) = ledger.index.get(call_id) else {
            warn!(call_id = %call_id, "Close for unknown call id ignored");
            return;
        };
        let record = &mut ledger.records[i];
        if !record.is_open() {
            debug!(call_id = %call_id, status = ?record.status, "Invocation already closed");
            return;
        }
        record.status = match (result.status, result.category()) {
            (CapabilityStatus::Success, _) => RecordStatus::Success,
            (CapabilityStatus::Error, Some(ErrorCategory::Cancelled)) => RecordStatus::Cancelled,
            (CapabilityStatus::Error, _) => RecordStatus::Error,
        };
        record.finished_at = Some(Utc::now());
        record.result = Some(result);
    }

    /// Close every still-open record as cancelled. Returns how many were closed.
    pub fn cancel_outstanding(&self, reason: &str) -> usize {
        let mut ledger = self.ledger();
        let now = Utc::now();
        let mut cancelled = 0;
        for record in ledger.records.iter_mut().filter(|r| r.is_open()) {
            record.status = RecordStatus::Cancelled;
            record.finished_at = Some(now);
            record.result = Some(CapabilityResult::failure(CapabilityError::new(
                ErrorCategory::Cancelled,
                reason,
            )));
            cancelled += 1;
        }
        if cancelled > 0 {
            warn!(cancelled, reason, "Cancelled outstanding invocations");
        }
        cancelled
    }

    pub fn depth_of(&self, call_id: &CallId) -> Option<u32> {
        let ledger = self.ledger();
        ledger.index.get(call_id).map(|&i| ledger.records[i].depth)
    }

    pub fn get(&self, call_id: &CallId) -> Option<InvocationRecord> {
        let ledger = self.ledger();
        ledger.index.get(call_id).map(|&i| ledger.records[i].clone())
    }

    /// Snapshot of all records in open order.
    pub fn records(&self) -> Vec<InvocationRecord> {
        self.ledger().records.clone()
    }

    pub fn len(&self) -> usize {
        self.ledger().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_count(&self) -> usize {
        self.ledger().records.iter().filter(|r| r.is_open()).count()
    }

    /// The call tree of everything recorded so far.
    pub fn report(&self) -> CallReport {
        CallReport::from_records(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn open_assigns_depth_from_parent() {
        let tracker = CallTracker::new();
        let root = tracker.open(None, "delegate", serde_json::json!({}));
        let child = tracker.open(Some(&root), "search_web", serde_json::json!({"query": "x"}));
        let grandchild = tracker.open(Some(&child), "webpage_reader", serde_json::json!({}));

        assert_eq!(tracker.depth_of(&root), Some(0));
        assert_eq!(tracker.depth_of(&child), Some(1));
        assert_eq!(tracker.depth_of(&grandchild), Some(2));
        assert_eq!(tracker.get(&grandchild).unwrap().parent_call_id, Some(child));
    }

    #[test]
    fn ids_are_unique_across_trackers() {
        let a = CallTracker::new();
        let b = CallTracker::new();
        let id_a = a.open(None, "search_web", serde_json::Value::Null);
        let id_b = b.open(None, "search_web", serde_json::Value::Null);
        assert_ne!(id_a, id_b);
        assert!(id_a.as_str().starts_with("search_web_"));
    }

    #[test]
    fn close_sets_status_and_finish_time() {
        let tracker = CallTracker::new();
        let ok = tracker.open(None, "a", serde_json::Value::Null);
        let bad = tracker.open(None, "b", serde_json::Value::Null);

        tracker.close(&ok, CapabilityResult::success(serde_json::json!(1), "done"));
        tracker.close(&bad, CapabilityResult::failure(CapabilityError::implementation("boom")));

        let ok = tracker.get(&ok).unwrap();
        assert_eq!(ok.status, RecordStatus::Success);
        assert!(ok.finished_at.is_some());
        assert_eq!(ok.status_message(), "done");

        let bad = tracker.get(&bad).unwrap();
        assert_eq!(bad.status, RecordStatus::Error);
        assert_eq!(bad.error_category(), Some(ErrorCategory::ImplementationError));
    }

    #[test]
    fn second_close_is_ignored() {
        let tracker = CallTracker::new();
        let id = tracker.open(None, "a", serde_json::Value::Null);
        tracker.close(&id, CapabilityResult::success(serde_json::json!(1), "first"));
        tracker.close(&id, CapabilityResult::success(serde_json::json!(2), "second"));
        assert_eq!(tracker.get(&id).unwrap().status_message(), "first");
    }

    #[test]
    fn cancel_outstanding_closes_only_open_records() {
        let tracker = CallTracker::new();
        let done = tracker.open(None, "a", serde_json::Value::Null);
        let pending = tracker.open(Some(&done), "b", serde_json::Value::Null);
        tracker.close(&done, CapabilityResult::success(serde_json::Value::Null, "ok"));

        assert_eq!(tracker.cancel_outstanding("request timed out"), 1);
        assert_eq!(tracker.open_count(), 0);
        let pending = tracker.get(&pending).unwrap();
        assert_eq!(pending.status, RecordStatus::Cancelled);
        assert_eq!(pending.error_category(), Some(ErrorCategory::Cancelled));
        assert_eq!(tracker.get(&done).unwrap().status, RecordStatus::Success);
    }

    #[test]
    fn concurrent_open_close_loses_nothing() {
        let tracker = Arc::new(CallTracker::new());
        let root = tracker.open(None, "delegate", serde_json::Value::Null);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracker = tracker.clone();
                let root = root.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = tracker.open(Some(&root), "tool", serde_json::json!({"t": t, "i": i}));
                        tracker.close(&id, CapabilityResult::success(serde_json::Value::Null, "ok"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(tracker.len(), 1 + 8 * 50);
        assert_eq!(tracker.open_count(), 1);
        let report = tracker.report();
        assert_eq!(report.roots.len(), 1);
        assert_eq!(report.roots[0].children.len(), 400);
    }
}
