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

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use std::sync::Arc;

use crate::address::AddressKind;
use crate::routing_table::ParticipantId;

use super::MulticastSubscriber;

/// Per-transport skeletons used to turn "this provider exports
/// multicast X" into a native subscription. At most one skeleton per
/// kind.
pub struct MulticastSubscriberRegistry {
    skeletons: Mutex<HashMap<AddressKind, Arc<dyn MulticastSubscriber>>>,
}

impl MulticastSubscriberRegistry {
    pub fn new() -> Self {
        MulticastSubscriberRegistry {
            skeletons: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, kind: AddressKind, skeleton: Arc<dyn MulticastSubscriber>) {
        self.skeletons.lock().insert(kind, skeleton);
    }

    pub fn get(&self, kind: AddressKind) -> Option<Arc<dyn MulticastSubscriber>> {
        self.skeletons.lock().get(&kind).cloned()
    }
}

impl Default for MulticastSubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened to the directory as the result of a `remove` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub removed: bool,
    pub was_last_for_multicast: bool,
}

/// `multicastId -> set of subscriber participant ids`. Single lock:
/// writes (subscribe/unsubscribe) are rare compared to the
/// publish-time read of a multicast's subscriber set.
pub struct MulticastReceiverDirectory {
    receivers: Mutex<HashMap<String, HashSet<ParticipantId>>>,
}

impl MulticastReceiverDirectory {
    pub fn new() -> Self {
        MulticastReceiverDirectory {
            receivers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if this is the first receiver registered for
    /// `multicast_id` (i.e. a native subscription needs to be created).
    pub fn add(&self, multicast_id: &str, subscriber: ParticipantId) -> bool {
        let mut receivers = self.receivers.lock();
        let set = receivers.entry(multicast_id.to_string()).or_default();
        let was_empty = set.is_empty();
        set.insert(subscriber);
        was_empty
    }

    pub fn remove(&self, multicast_id: &str, subscriber: &ParticipantId) -> RemovalOutcome {
        let mut receivers = self.receivers.lock();

        let removed = match receivers.get_mut(multicast_id) {
            Some(set) => set.remove(subscriber),
            None => false,
        };

        let was_last = match receivers.get(multicast_id) {
            Some(set) if set.is_empty() => {
                receivers.remove(multicast_id);
                true
            }
            Some(_) => false,
            None => false,
        };

        RemovalOutcome {
            removed,
            was_last_for_multicast: removed && was_last,
        }
    }

    pub fn subscribers(&self, multicast_id: &str) -> Vec<ParticipantId> {
        self.receivers
            .lock()
            .get(multicast_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty_for(&self, multicast_id: &str) -> bool {
        self.receivers
            .lock()
            .get(multicast_id)
            .map(|set| set.is_empty())
            .unwrap_or(true)
    }

    /// Total subscriber registrations across every multicast id, for
    /// diagnostics.
    pub fn receiver_count(&self) -> usize {
        self.receivers.lock().values().map(HashSet::len).sum()
    }
}

impl Default for MulticastReceiverDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reports_first_subscriber() {
        let dir = MulticastReceiverDirectory::new();
        let s1 = ParticipantId::new("S1").unwrap();
        let s2 = ParticipantId::new("S2").unwrap();

        assert!(dir.add("PP/news/a", s1.clone()));
        assert!(!dir.add("PP/news/a", s2.clone()));

        let mut subs = dir.subscribers("PP/news/a");
        subs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(subs, vec![s1, s2]);
    }

    #[test]
    fn remove_reports_last_subscriber_leaving() {
        let dir = MulticastReceiverDirectory::new();
        let s1 = ParticipantId::new("S1").unwrap();
        let s2 = ParticipantId::new("S2").unwrap();

        dir.add("m1", s1.clone());
        dir.add("m1", s2.clone());

        let outcome = dir.remove("m1", &s1);
        assert_eq!(
            outcome,
            RemovalOutcome {
                removed: true,
                was_last_for_multicast: false
            }
        );

        let outcome = dir.remove("m1", &s2);
        assert_eq!(
            outcome,
            RemovalOutcome {
                removed: true,
                was_last_for_multicast: true
            }
        );

        assert!(dir.is_empty_for("m1"));
    }

    #[test]
    fn add_remove_round_trip_restores_prior_state() {
        let dir = MulticastReceiverDirectory::new();
        let s1 = ParticipantId::new("S1").unwrap();

        dir.add("m1", s1.clone());
        dir.remove("m1", &s1);

        assert!(dir.subscribers("m1").is_empty());
        assert!(dir.is_empty_for("m1"));
    }

    #[test]
    fn remove_of_unknown_subscriber_reports_not_removed() {
        let dir = MulticastReceiverDirectory::new();
        let s1 = ParticipantId::new("S1").unwrap();

        let outcome = dir.remove("m1", &s1);
        assert!(!outcome.removed);
        assert!(!outcome.was_last_for_multicast);
    }
}
