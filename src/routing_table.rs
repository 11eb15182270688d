// This file is part of msg-router.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! The routing table: participant id -> address, with
//! entries tagged provisioned (sticky, persisted) or learned (transient,
//! in-memory only).
//!
//! Reads are lock-free: a lookup loads the current `Arc<HashMap>`
//! snapshot and never blocks a concurrent writer. Writers are serialized
//! by a single mutex and publish a freshly cloned snapshot; the previous
//! snapshot is reclaimed once in-flight readers drop their `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::RouterError;

/// An opaque, non-empty participant identifier. Cheap to clone (backed
/// by an `Arc<str>`) since it is used as a hash map key throughout the
/// hot path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(Arc<str>);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Result<Self, RouterError> {
        let id = id.into();
        if id.is_empty() {
            return Err(RouterError::invalid("participant id must not be empty"));
        }
        Ok(ParticipantId(Arc::from(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single routing-table entry. `is_sticky` entries are provisioned:
/// they survive restart and are rewritten to the persistence file after
/// every successful mutation. `is_globally_visible` controls whether an
/// `addNextHop` is forwarded to the parent router in child mode.
#[derive(Debug, Clone)]
pub struct RoutingEntry {
    pub address: Address,
    pub is_globally_visible: bool,
    pub is_sticky: bool,
    pub recorded_at: Instant,
}

impl RoutingEntry {
    pub fn new(address: Address, is_globally_visible: bool, is_sticky: bool) -> Self {
        RoutingEntry {
            address,
            is_globally_visible,
            is_sticky,
            recorded_at: Instant::now(),
        }
    }
}

type Snapshot = Arc<HashMap<ParticipantId, RoutingEntry>>;

pub struct RoutingTable {
    snapshot: ArcSwap<HashMap<ParticipantId, RoutingEntry>>,
    writer_lock: Mutex<()>,
}

impl RoutingTable {
    pub fn new() -> Self {
        RoutingTable {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            writer_lock: Mutex::new(()),
        }
    }

    /// O(1) amortized lookup by participant id. Never blocks on a
    /// concurrent writer.
    pub fn lookup(&self, id: &ParticipantId) -> Option<RoutingEntry> {
        self.snapshot.load().get(id).cloned()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.snapshot.load().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or overwrite an entry. Returns the previous entry, if any.
    pub fn insert(&self, id: ParticipantId, entry: RoutingEntry) -> Option<RoutingEntry> {
        let _guard = self.writer_lock.lock();

        let current = self.snapshot.load();
        let mut next: HashMap<ParticipantId, RoutingEntry> = (**current).clone();
        let previous = next.insert(id, entry);
        self.snapshot.store(Arc::new(next));

        previous
    }

    /// Remove an entry. Returns it if it was present.
    pub fn remove(&self, id: &ParticipantId) -> Option<RoutingEntry> {
        let _guard = self.writer_lock.lock();

        let current = self.snapshot.load();
        if !current.contains_key(id) {
            return None;
        }

        let mut next: HashMap<ParticipantId, RoutingEntry> = (**current).clone();
        let removed = next.remove(id);
        self.snapshot.store(Arc::new(next));

        removed
    }

    /// All sticky (provisioned) entries, for persistence.
    pub fn provisioned_entries(&self) -> Vec<(ParticipantId, RoutingEntry)> {
        self.snapshot
            .load()
            .iter()
            .filter(|(_, e)| e.is_sticky)
            .map(|(id, e)| (id.clone(), e.clone()))
            .collect()
    }

    pub(crate) fn current(&self) -> Snapshot {
        self.snapshot.load_full()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(topic: &str) -> Address {
        Address::Mqtt {
            broker_uri: "mqtt://b".into(),
            topic: topic.into(),
        }
    }

    #[test]
    fn empty_participant_id_rejected() {
        assert!(ParticipantId::new("").is_err());
    }

    #[test]
    fn at_most_one_entry_per_key() {
        let table = RoutingTable::new();
        let p1 = ParticipantId::new("P1").unwrap();

        table.insert(p1.clone(), RoutingEntry::new(addr("t1"), false, false));
        let prev = table.insert(p1.clone(), RoutingEntry::new(addr("t2"), false, false));

        assert!(prev.is_some());
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(&p1).unwrap().address, addr("t2"));
    }

    #[test]
    fn add_then_remove_round_trips() {
        let table = RoutingTable::new();
        let p1 = ParticipantId::new("P1").unwrap();

        table.insert(p1.clone(), RoutingEntry::new(addr("t1"), false, true));
        assert!(table.contains(&p1));

        table.remove(&p1);
        assert!(!table.contains(&p1));
        assert!(table.is_empty());
    }

    #[test]
    fn provisioned_entries_filters_learned() {
        let table = RoutingTable::new();
        let sticky = ParticipantId::new("Sticky").unwrap();
        let learned = ParticipantId::new("Learned").unwrap();

        table.insert(sticky.clone(), RoutingEntry::new(addr("t1"), false, true));
        table.insert(learned, RoutingEntry::new(addr("t2"), false, false));

        let provisioned = table.provisioned_entries();
        assert_eq!(provisioned.len(), 1);
        assert_eq!(provisioned[0].0, sticky);
    }

    #[test]
    fn readers_see_a_stable_snapshot_across_a_write() {
        let table = RoutingTable::new();
        let p1 = ParticipantId::new("P1").unwrap();
        table.insert(p1.clone(), RoutingEntry::new(addr("t1"), false, false));

        let snapshot_before = table.current();
        table.insert(p1.clone(), RoutingEntry::new(addr("t2"), false, false));

        // The snapshot taken before the write is untouched by it.
        assert_eq!(snapshot_before.get(&p1).unwrap().address, addr("t1"));
        assert_eq!(table.lookup(&p1).unwrap().address, addr("t2"));
    }
}
