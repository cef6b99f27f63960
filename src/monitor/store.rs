//! Known-disruption store — the sole state carried between poll cycles.
//!
//! A flat JSON document on disk so restarts do not re-announce everything the
//! site currently lists. The format is private process state, not a
//! compatibility contract; an unreadable file degrades to an empty store with
//! a warning (one burst of "new" notifications, same as the in-memory
//! variants of the original bot).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::DisruptionRecord;

pub struct KnownStore {
    records: BTreeMap<String, DisruptionRecord>,
    path: Option<PathBuf>,
}

impl KnownStore {
    /// In-memory only, never persisted. Used by tests and by deployments that
    /// explicitly opt out of a state file.
    pub fn ephemeral() -> Self {
        Self {
            records: BTreeMap::new(),
            path: None,
        }
    }

    /// Load from `path`, or start empty when the file is missing/unreadable.
    pub fn load(path: &Path) -> Self {
        let records = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, DisruptionRecord>>(
                &contents,
            ) {
                Ok(map) => {
                    info!(
                        "store: loaded {} known disruption(s) from {}",
                        map.len(),
                        path.display()
                    );
                    map
                }
                Err(e) => {
                    warn!(
                        "store: {} is not parseable ({}) — starting empty",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            records,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn records(&self) -> &BTreeMap<String, DisruptionRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the map with the differ's `next_store` and persist.
    /// Persistence failures are logged, not propagated — losing the file
    /// costs one notification burst after a restart, not the cycle.
    pub fn commit(&mut self, next: BTreeMap<String, DisruptionRecord>) {
        self.records = next;
        let Some(path) = self.path.clone() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&self.records) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!("store: failed to write {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("store: serialize failed: {}", e),
        }
    }
}
