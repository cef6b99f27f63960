//! Disruption Differ — the pure core of the monitor.
//!
//! `diff` is a function of `(previous store, current batch, now)` with no I/O
//! and no clock access of its own, so its properties (idempotence, partition,
//! expiry-wins) are directly testable.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::types::{DisruptionRecord, EventKind, NotificationEvent};

/// Result of diffing one extracted snapshot against the known state.
#[derive(Debug)]
pub struct DiffOutcome {
    /// Records appearing for the first time, in batch order.
    pub new_events: Vec<NotificationEvent>,
    /// Known records that vanished from the page or whose validity window
    /// closed, ordered by id for determinism.
    pub resolved_events: Vec<NotificationEvent>,
    /// The store after applying this cycle: resolved removed, new inserted.
    pub next_store: BTreeMap<String, DisruptionRecord>,
}

/// Diff `batch` against `store`.
///
/// * new: in `batch`, absent from `store`, and not already expired at `now`.
///   The expiry guard keeps the differ idempotent — an expired record the
///   site still lists would otherwise oscillate between "resolved" and "new"
///   on consecutive calls.
/// * resolved: in `store` but absent from `batch`, **or** expired at `now`
///   even when the site still lists it (expiry wins).
///
/// An id can never be both: new events come from non-store ids, resolved
/// events from store ids.
pub fn diff(
    store: &BTreeMap<String, DisruptionRecord>,
    batch: &[DisruptionRecord],
    now: NaiveDateTime,
) -> DiffOutcome {
    let batch_ids: HashSet<&str> = batch.iter().map(|r| r.id.as_str()).collect();

    // BTreeMap iteration is id-ordered, so resolved order is deterministic
    // regardless of how the batch was ordered.
    let resolved_events: Vec<NotificationEvent> = store
        .values()
        .filter(|known| !batch_ids.contains(known.id.as_str()) || known.is_expired(now))
        .map(|known| NotificationEvent {
            kind: EventKind::Resolved,
            record: known.clone(),
        })
        .collect();

    let mut seen_new: HashSet<&str> = HashSet::new();
    let new_events: Vec<NotificationEvent> = batch
        .iter()
        .filter(|r| !store.contains_key(&r.id) && !r.is_expired(now))
        .filter(|r| seen_new.insert(r.id.as_str()))
        .map(|r| NotificationEvent {
            kind: EventKind::New,
            record: r.clone(),
        })
        .collect();

    let mut next_store = store.clone();
    for ev in &resolved_events {
        next_store.remove(&ev.record.id);
    }
    for ev in &new_events {
        next_store.insert(ev.record.id.clone(), ev.record.clone());
    }

    DiffOutcome {
        new_events,
        resolved_events,
        next_store,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_table_time, DisruptionCategory};

    fn record(id: &str, valid_until: &str) -> DisruptionRecord {
        DisruptionRecord {
            id: id.to_string(),
            category: DisruptionCategory::Disruption,
            location: "Ort".into(),
            region: "Region".into(),
            effect: "Wirkung".into(),
            cause: "Ursache".into(),
            valid_from: "01.01.2026 00:00".into(),
            valid_until: valid_until.to_string(),
            valid_until_ts: parse_table_time(valid_until),
        }
    }

    fn now() -> NaiveDateTime {
        parse_table_time("15.01.2026 12:00").unwrap()
    }

    fn ids(events: &[NotificationEvent]) -> Vec<&str> {
        events.iter().map(|e| e.record.id.as_str()).collect()
    }

    #[test]
    fn test_first_sighting_is_new() {
        let store = BTreeMap::new();
        let batch = vec![record("A1", "16.01.2026 12:00")];
        let out = diff(&store, &batch, now());
        assert_eq!(ids(&out.new_events), vec!["A1"]);
        assert!(out.resolved_events.is_empty());
        assert!(out.next_store.contains_key("A1"));
    }

    #[test]
    fn test_disappearance_is_resolved() {
        let mut store = BTreeMap::new();
        store.insert("A1".to_string(), record("A1", "16.01.2026 12:00"));
        let out = diff(&store, &[], now());
        assert!(out.new_events.is_empty());
        assert_eq!(ids(&out.resolved_events), vec!["A1"]);
        assert!(out.next_store.is_empty());
    }

    #[test]
    fn test_expiry_wins_over_continued_listing() {
        let mut store = BTreeMap::new();
        store.insert("A1".to_string(), record("A1", "14.01.2026 12:00"));
        // The site still lists A1, but its window closed yesterday.
        let batch = vec![record("A1", "14.01.2026 12:00")];
        let out = diff(&store, &batch, now());
        assert_eq!(ids(&out.resolved_events), vec!["A1"]);
        assert!(out.new_events.is_empty());
        assert!(out.next_store.is_empty());
    }

    #[test]
    fn test_idempotent_on_immediate_second_call() {
        let mut store = BTreeMap::new();
        store.insert("A1".to_string(), record("A1", "14.01.2026 12:00"));
        let batch = vec![
            record("A1", "14.01.2026 12:00"),
            record("B2", "20.01.2026 12:00"),
        ];
        let first = diff(&store, &batch, now());
        let second = diff(&first.next_store, &batch, now());
        assert!(second.new_events.is_empty(), "{:?}", second.new_events);
        assert!(second.resolved_events.is_empty());
        assert_eq!(second.next_store.len(), first.next_store.len());
    }

    #[test]
    fn test_partition_new_and_resolved_disjoint() {
        let mut store = BTreeMap::new();
        store.insert("A1".to_string(), record("A1", "16.01.2026 12:00"));
        store.insert("B2".to_string(), record("B2", "14.01.2026 12:00"));
        let batch = vec![
            record("A1", "16.01.2026 12:00"),
            record("C3", "18.01.2026 12:00"),
        ];
        let out = diff(&store, &batch, now());
        let new_ids: HashSet<&str> = ids(&out.new_events).into_iter().collect();
        let resolved_ids: HashSet<&str> = ids(&out.resolved_events).into_iter().collect();
        assert!(new_ids.is_disjoint(&resolved_ids));
        assert_eq!(new_ids, HashSet::from(["C3"]));
        assert_eq!(resolved_ids, HashSet::from(["B2"]));
    }

    #[test]
    fn test_event_sets_independent_of_batch_order() {
        let mut store = BTreeMap::new();
        store.insert("A1".to_string(), record("A1", "16.01.2026 12:00"));
        let forward = vec![
            record("B2", "17.01.2026 12:00"),
            record("C3", "18.01.2026 12:00"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = diff(&store, &forward, now());
        let b = diff(&store, &reversed, now());

        let set = |evs: &[NotificationEvent]| -> HashSet<String> {
            evs.iter().map(|e| e.record.id.clone()).collect()
        };
        assert_eq!(set(&a.new_events), set(&b.new_events));
        assert_eq!(set(&a.resolved_events), set(&b.resolved_events));
        assert_eq!(a.next_store.len(), b.next_store.len());
    }

    #[test]
    fn test_unparseable_valid_until_never_expires() {
        let mut store = BTreeMap::new();
        store.insert("A1".to_string(), record("A1", "bis auf weiteres"));
        let batch = vec![record("A1", "bis auf weiteres")];
        let out = diff(&store, &batch, now());
        assert!(out.new_events.is_empty());
        assert!(out.resolved_events.is_empty());
        assert!(out.next_store.contains_key("A1"));
    }
}
