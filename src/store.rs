//! Reconciliation store: the latest known snapshot per task id.
//!
//! Entries keep the position they were given when first seen. New ids go to
//! the front; updates replace the entry in place. Nothing is ever evicted
//! during a session.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::task::{TaskSnapshot, TaskStatus};

/// Result of applying one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First snapshot for this id; placed at the front.
    Inserted,
    /// Existing entry replaced in place.
    Replaced { previous: TaskStatus },
    /// Identical to the held entry.
    Unchanged,
    /// Both sides carry a version and the incoming one is older.
    Stale { held: u64, incoming: u64 },
}

impl UpsertOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted | UpsertOutcome::Replaced { .. })
    }
}

/// Ordered, deduplicated task collection.
///
/// Order is kept with a first-seen sequence number; iterating in reverse
/// sequence order yields newest-first, which is the display order.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    entries: BTreeMap<Reverse<u64>, TaskSnapshot>,
    positions: HashMap<String, Reverse<u64>>,
    next_seq: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id.
    ///
    /// The most recently received snapshot wins. The only exception is when
    /// both the held and the incoming snapshot carry a `version` and the
    /// incoming one is lower.
    pub fn upsert(&mut self, snapshot: TaskSnapshot) -> UpsertOutcome {
        if !snapshot.status.is_known() {
            warn!(
                task_id = %snapshot.id,
                status = %snapshot.status,
                "unrecognized task status"
            );
        }

        let Some(key) = self.positions.get(&snapshot.id).copied() else {
            let key = Reverse(self.next_seq);
            self.next_seq += 1;
            debug!(task_id = %snapshot.id, status = %snapshot.status, "task inserted");
            self.positions.insert(snapshot.id.clone(), key);
            self.entries.insert(key, snapshot);
            return UpsertOutcome::Inserted;
        };

        let Some(held) = self.entries.get_mut(&key) else {
            // positions and entries only change together; recover by re-inserting
            self.positions.remove(&snapshot.id);
            return self.upsert(snapshot);
        };

        if let (Some(held_version), Some(incoming)) = (held.version, snapshot.version) {
            if incoming < held_version {
                debug!(
                    task_id = %snapshot.id,
                    held = held_version,
                    incoming,
                    "stale snapshot ignored"
                );
                return UpsertOutcome::Stale {
                    held: held_version,
                    incoming,
                };
            }
        }

        if *held == snapshot {
            return UpsertOutcome::Unchanged;
        }

        if !held.status.can_transition_to(&snapshot.status) {
            warn!(
                task_id = %snapshot.id,
                from = %held.status,
                to = %snapshot.status,
                "unexpected status transition"
            );
        }
        debug!(task_id = %snapshot.id, status = %snapshot.status, "task updated");
        let previous = std::mem::replace(held, snapshot).status;
        UpsertOutcome::Replaced { previous }
    }

    pub fn get(&self, id: &str) -> Option<&TaskSnapshot> {
        let key = self.positions.get(id)?;
        self.entries.get(key)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in store order (most recently first-seen first).
    pub fn iter(&self) -> impl Iterator<Item = &TaskSnapshot> + '_ {
        self.entries.values()
    }

    /// Owned copy of the entries in store order.
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.iter().cloned().collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::from_tasks(self.iter())
    }
}

/// Per-status totals for queue health summaries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusCounts {
    known: [usize; 6],
    pub unknown: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a TaskSnapshot>) -> Self {
        let mut counts = StatusCounts::default();
        for task in tasks {
            counts.total += 1;
            match known_index(&task.status) {
                Some(idx) => counts.known[idx] += 1,
                None => counts.unknown += 1,
            }
        }
        counts
    }

    pub fn get(&self, status: &TaskStatus) -> usize {
        match known_index(status) {
            Some(idx) => self.known[idx],
            None => self.unknown,
        }
    }

    /// Known statuses with their counts, in display order.
    pub fn known(&self) -> impl Iterator<Item = (TaskStatus, usize)> + '_ {
        TaskStatus::KNOWN
            .into_iter()
            .zip(self.known.iter().copied())
    }
}

fn known_index(status: &TaskStatus) -> Option<usize> {
    TaskStatus::KNOWN.iter().position(|known| known == status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: &str, status: TaskStatus) -> TaskSnapshot {
        TaskSnapshot::new(id, format!("task-{id}"), status)
    }

    fn ids(store: &TaskStore) -> Vec<&str> {
        store.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn new_id_prepends() {
        let mut store = TaskStore::new();
        store.upsert(snap("B", TaskStatus::Pending));
        store.upsert(snap("A", TaskStatus::Pending));
        assert_eq!(ids(&store), vec!["A", "B"]);

        let outcome = store.upsert(snap("C", TaskStatus::Pending));
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(ids(&store), vec!["C", "A", "B"]);
    }

    #[test]
    fn existing_id_keeps_position() {
        let mut store = TaskStore::new();
        store.upsert(snap("C", TaskStatus::Pending));
        store.upsert(snap("B", TaskStatus::Pending));
        store.upsert(snap("A", TaskStatus::Pending));
        assert_eq!(ids(&store), vec!["A", "B", "C"]);

        let outcome = store.upsert(snap("B", TaskStatus::Processing));
        assert_eq!(
            outcome,
            UpsertOutcome::Replaced {
                previous: TaskStatus::Pending
            }
        );
        assert_eq!(ids(&store), vec!["A", "B", "C"]);
        assert_eq!(store.get("B").map(|t| &t.status), Some(&TaskStatus::Processing));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut store = TaskStore::new();
        store.upsert(snap("A", TaskStatus::Pending));
        store.upsert(snap("B", TaskStatus::Failed));
        let before = store.snapshots();

        let outcome = store.upsert(snap("B", TaskStatus::Failed));
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert!(!outcome.changed());
        assert_eq!(store.snapshots(), before);
    }

    #[test]
    fn replacement_is_wholesale() {
        let mut store = TaskStore::new();
        store.upsert(
            snap("A", TaskStatus::Pending).with_payload(serde_json::json!({"to": "x", "cc": "y"})),
        );
        store.upsert(snap("A", TaskStatus::Processing).with_payload(serde_json::json!({"to": "z"})));
        let held = store.get("A").expect("held");
        assert_eq!(held.payload.get("to"), Some(&serde_json::json!("z")));
        assert!(held.payload.get("cc").is_none());
    }

    #[test]
    fn out_of_order_status_still_overwrites() {
        let mut store = TaskStore::new();
        store.upsert(snap("A", TaskStatus::Completed));
        let outcome = store.upsert(snap("A", TaskStatus::Pending));
        assert!(outcome.changed());
        assert_eq!(store.get("A").map(|t| &t.status), Some(&TaskStatus::Pending));
    }

    #[test]
    fn versioned_snapshots_reject_older_versions() {
        let mut store = TaskStore::new();
        let mut newer = snap("A", TaskStatus::Completed);
        newer.version = Some(5);
        let mut older = snap("A", TaskStatus::Processing);
        older.version = Some(4);

        store.upsert(newer);
        let outcome = store.upsert(older);
        assert_eq!(outcome, UpsertOutcome::Stale { held: 5, incoming: 4 });
        assert_eq!(store.get("A").map(|t| &t.status), Some(&TaskStatus::Completed));

        // unversioned snapshots always win
        store.upsert(snap("A", TaskStatus::Failed));
        assert_eq!(store.get("A").map(|t| &t.status), Some(&TaskStatus::Failed));
    }

    #[test]
    fn unknown_status_is_accepted() {
        let mut store = TaskStore::new();
        store.upsert(snap("A", TaskStatus::parse("paused")));
        assert_eq!(
            store.get("A").map(|t| t.status.as_str()),
            Some("paused")
        );
    }

    #[test]
    fn status_counts_cover_known_and_unknown() {
        let mut store = TaskStore::new();
        store.upsert(snap("A", TaskStatus::Pending));
        store.upsert(snap("B", TaskStatus::Pending));
        store.upsert(snap("C", TaskStatus::Failed));
        store.upsert(snap("D", TaskStatus::parse("paused")));

        let counts = store.status_counts();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.get(&TaskStatus::Pending), 2);
        assert_eq!(counts.get(&TaskStatus::Failed), 1);
        assert_eq!(counts.get(&TaskStatus::Retrying), 0);
        assert_eq!(counts.unknown, 1);
        let known: Vec<usize> = counts.known().map(|(_, count)| count).collect();
        assert_eq!(known, vec![2, 0, 0, 1, 0, 0]);
    }
}
