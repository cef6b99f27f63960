//! Polling loop, snapshot diffing and the persisted known-disruption store.

pub mod differ;
pub mod scheduler;
pub mod store;

use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex};

/// Shared runtime status, read by the health endpoint and the `!status`
/// Discord command, written by the scheduler after every cycle.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusInner>>,
}

#[derive(Default)]
struct StatusInner {
    last_check: Option<NaiveDateTime>,
    cycles_ok: u64,
    cycles_failed: u64,
    known_count: usize,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at: NaiveDateTime, known_count: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.last_check = Some(at);
            inner.cycles_ok += 1;
            inner.known_count = known_count;
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.cycles_failed += 1;
        }
    }

    pub fn last_check(&self) -> Option<NaiveDateTime> {
        self.inner.lock().ok().and_then(|inner| inner.last_check)
    }

    pub fn snapshot(&self) -> serde_json::Value {
        match self.inner.lock() {
            Ok(inner) => serde_json::json!({
                "last_check": inner
                    .last_check
                    .map(|t| t.format("%d.%m.%Y %H:%M:%S").to_string()),
                "cycles_ok": inner.cycles_ok,
                "cycles_failed": inner.cycles_failed,
                "known_disruptions": inner.known_count,
            }),
            Err(_) => serde_json::json!({ "error": "status unavailable" }),
        }
    }
}
