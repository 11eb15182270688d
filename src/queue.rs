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

//! The message queue: holds messages keyed by destination
//! participant id while that destination is unknown. Split into 16
//! buckets so that unrelated destinations don't contend on the
//! same lock; bounded globally by `queue_max_length`.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::RouterError;
use crate::message::Message;
use crate::routing_table::ParticipantId;

const BUCKET_COUNT: usize = 16;

pub struct QueuedItem {
    pub message: Message,
    pub inserted_at: Instant,
    pub on_failure: Option<Box<dyn FnOnce(RouterError) + Send>>,
}

impl QueuedItem {
    fn fail(self, cause: RouterError) {
        if let Some(cb) = self.on_failure {
            cb(cause);
        }
    }
}

fn bucket_of(id: &ParticipantId) -> usize {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    // Derived from a hash rather than the id's literal first character
    // so that ids sharing a common prefix (a frequent pattern for
    // hierarchical participant ids) still spread across buckets.
    let first_byte = (hasher.finish() & 0xff) as usize;
    first_byte % BUCKET_COUNT
}

#[derive(Default)]
struct Bucket {
    items: HashMap<ParticipantId, VecDeque<QueuedItem>>,
}

pub struct MessageQueue {
    buckets: Vec<Mutex<Bucket>>,
    max_length: usize,
    total_len: AtomicUsize,
}

impl MessageQueue {
    pub fn new(max_length: usize) -> Self {
        MessageQueue {
            buckets: (0..BUCKET_COUNT).map(|_| Mutex::new(Bucket::default())).collect(),
            max_length,
            total_len: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.total_len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_for(&self, id: &ParticipantId) -> usize {
        let bucket = self.buckets[bucket_of(id)].lock();
        bucket.items.get(id).map(VecDeque::len).unwrap_or(0)
    }

    /// Enqueue `item` under `id`. If the queue is already at capacity the
    /// oldest non-expired item queued for `id` is evicted first and its
    /// failure callback invoked with `QueueFull`; there is no
    /// cross-destination eviction, since that would require a lock
    /// spanning every bucket on every enqueue.
    pub fn enqueue(&self, id: ParticipantId, item: QueuedItem) {
        if self.total_len.load(Ordering::SeqCst) >= self.max_length {
            if let Some(evicted) = self.evict_oldest(&id) {
                evicted.fail(RouterError::QueueFull);
            }
        }

        let mut bucket = self.buckets[bucket_of(&id)].lock();
        bucket.items.entry(id).or_default().push_back(item);
        self.total_len.fetch_add(1, Ordering::SeqCst);
    }

    fn evict_oldest(&self, id: &ParticipantId) -> Option<QueuedItem> {
        let mut bucket = self.buckets[bucket_of(id)].lock();
        let queue = bucket.items.get_mut(id)?;
        let evicted = queue.pop_front();
        if evicted.is_some() {
            self.total_len.fetch_sub(1, Ordering::SeqCst);
        }
        evicted
    }

    /// Atomically remove and return every item queued for `id`, in
    /// enqueue order.
    pub fn drain(&self, id: &ParticipantId) -> Vec<QueuedItem> {
        let mut bucket = self.buckets[bucket_of(id)].lock();
        match bucket.items.remove(id) {
            Some(queue) => {
                let drained: Vec<_> = queue.into_iter().collect();
                self.total_len.fetch_sub(drained.len(), Ordering::SeqCst);
                drained
            }
            None => Vec::new(),
        }
    }

    /// Discard every expired item across every bucket and invoke its
    /// failure callback with `Expired`. Keys left with an empty list are
    /// erased. Run periodically by the sweeper thread.
    pub fn sweep_expired(&self, now: Instant) {
        for bucket_lock in &self.buckets {
            let mut bucket = bucket_lock.lock();
            let mut emptied = Vec::new();

            for (id, queue) in bucket.items.iter_mut() {
                let mut expired = Vec::new();
                while let Some(front) = queue.front() {
                    if front.message.is_expired(now) {
                        expired.push(queue.pop_front().unwrap());
                    } else {
                        break;
                    }
                }
                // Expired entries need not only be at the front in
                // practice (a later-enqueued message can carry a shorter
                // TTL), so sweep the remainder too.
                let mut i = 0;
                while i < queue.len() {
                    if queue[i].message.is_expired(now) {
                        expired.push(queue.remove(i).unwrap());
                    } else {
                        i += 1;
                    }
                }

                if !expired.is_empty() {
                    self.total_len.fetch_sub(expired.len(), Ordering::SeqCst);
                    for item in expired {
                        item.fail(RouterError::Expired);
                    }
                }

                if queue.is_empty() {
                    emptied.push(id.clone());
                }
            }

            for id in emptied {
                bucket.items.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    fn msg(id: &str, to: &str, ttl_ms: u64) -> Message {
        Message::new(
            id,
            ParticipantId::new("From").unwrap(),
            to,
            MessageType::OneWay,
            Duration::from_millis(ttl_ms),
        )
    }

    fn item(message: Message) -> QueuedItem {
        QueuedItem {
            message,
            inserted_at: Instant::now(),
            on_failure: None,
        }
    }

    #[test]
    fn drain_returns_items_in_enqueue_order() {
        let queue = MessageQueue::new(100);
        let p1 = ParticipantId::new("P1").unwrap();

        queue.enqueue(p1.clone(), item(msg("m1", "P1", 5_000)));
        queue.enqueue(p1.clone(), item(msg("m2", "P1", 5_000)));

        assert_eq!(queue.len(), 2);

        let drained = queue.drain(&p1);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message.id, "m1");
        assert_eq!(drained[1].message.id, "m2");
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn sweep_discards_expired_and_invokes_callback() {
        let queue = MessageQueue::new(100);
        let p1 = ParticipantId::new("P1").unwrap();
        let failed = Arc::new(AtomicBool::new(false));
        let failed_clone = failed.clone();

        queue.enqueue(
            p1.clone(),
            QueuedItem {
                message: msg("m1", "P1", 0),
                inserted_at: Instant::now(),
                on_failure: Some(Box::new(move |e| {
                    assert_eq!(e, RouterError::Expired);
                    failed_clone.store(true, Ordering::SeqCst);
                })),
            },
        );

        std::thread::sleep(Duration::from_millis(5));
        queue.sweep_expired(Instant::now());

        assert_eq!(queue.len(), 0);
        assert!(failed.load(Ordering::SeqCst));
        assert_eq!(queue.len_for(&p1), 0);
    }

    #[test]
    fn overflow_evicts_oldest_for_same_destination() {
        let queue = MessageQueue::new(2);
        let p1 = ParticipantId::new("P1").unwrap();
        let evicted = Arc::new(AtomicBool::new(false));
        let evicted_clone = evicted.clone();

        queue.enqueue(
            p1.clone(),
            QueuedItem {
                message: msg("m1", "P1", 5_000),
                inserted_at: Instant::now(),
                on_failure: Some(Box::new(move |e| {
                    assert_eq!(e, RouterError::QueueFull);
                    evicted_clone.store(true, Ordering::SeqCst);
                })),
            },
        );
        queue.enqueue(p1.clone(), item(msg("m2", "P1", 5_000)));
        // Queue now at capacity (2 items); enqueueing a third evicts m1,
        // the oldest entry queued for P1.
        queue.enqueue(p1.clone(), item(msg("m3", "P1", 5_000)));

        let drained = queue.drain(&p1);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message.id, "m2");
        assert_eq!(drained[1].message.id, "m3");
        assert!(evicted.load(Ordering::SeqCst));
    }
}
