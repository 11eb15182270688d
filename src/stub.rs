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

//! The messaging-stub factory: given an address, returns a
//! one-shot send handle. Stubs are cached per address, sharded into
//! buckets by address hash (mirroring the message queue's bucketing) so
//! two concurrent `create()` calls only serialize when they land in the
//! same bucket.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::address::{Address, AddressKind};
use crate::error::RouterError;
use crate::message::Message;

const CACHE_BUCKET_COUNT: usize = 16;

fn bucket_of(address: &Address) -> usize {
    let mut hasher = DefaultHasher::new();
    address.hash(&mut hasher);
    let first_byte = (hasher.finish() & 0xff) as usize;
    first_byte % CACHE_BUCKET_COUNT
}

/// A transport-specific one-shot send handle. `transmit` is
/// fire-and-forget: the router never blocks on transport I/O, it only
/// registers a failure callback that the stub invokes if the send did
/// not succeed.
pub trait MessagingStub: Send + Sync {
    fn transmit(&self, message: Message, on_failure: Box<dyn FnOnce(RouterError) + Send>);
}

/// Creates a `MessagingStub` for a given address. Implementations are
/// registered per `AddressKind` with [`StubFactory::register`].
pub type StubCreator = Box<dyn Fn(&Address) -> Arc<dyn MessagingStub> + Send + Sync>;

pub trait MessagingStubFactory: Send + Sync {
    fn create(&self, address: &Address) -> Result<Arc<dyn MessagingStub>, RouterError>;

    /// Evict a cached stub, e.g. because the transport reported the
    /// address has become invalid (connection closed, topic rejected).
    /// The stub is recreated lazily on the next `create()`.
    fn remove(&self, address: &Address);
}

/// The concrete factory used by the router core. Holds one creator per
/// transport kind and a cache of live stubs keyed by the concrete
/// address.
pub struct StubFactory {
    creators: HashMap<AddressKind, StubCreator>,
    cache: Vec<Mutex<HashMap<Address, Arc<dyn MessagingStub>>>>,
}

impl StubFactory {
    pub fn new() -> Self {
        StubFactory {
            creators: HashMap::new(),
            cache: (0..CACHE_BUCKET_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Register the creator used for every address of `kind`. Intended
    /// to be called once per kind while wiring up the router; later
    /// registrations for the same kind replace earlier ones.
    pub fn register(&mut self, kind: AddressKind, creator: StubCreator) {
        self.creators.insert(kind, creator);
    }

    pub fn cached_len(&self) -> usize {
        self.cache.iter().map(|bucket| bucket.lock().len()).sum()
    }
}

impl Default for StubFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagingStubFactory for StubFactory {
    fn create(&self, address: &Address) -> Result<Arc<dyn MessagingStub>, RouterError> {
        // Locking only this address's bucket for the lookup-or-insert
        // keeps two concurrent calls for the same address from racing to
        // create two distinct stubs, while calls for addresses in other
        // buckets proceed uncontended.
        let mut bucket = self.cache[bucket_of(address)].lock();

        if let Some(stub) = bucket.get(address) {
            return Ok(stub.clone());
        }

        let creator = self
            .creators
            .get(&address.kind())
            .ok_or(RouterError::NoTransport)?;

        let stub = creator(address);
        bucket.insert(address.clone(), stub.clone());

        Ok(stub)
    }

    fn remove(&self, address: &Address) {
        self.cache[bucket_of(address)].lock().remove(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStub;

    impl MessagingStub for CountingStub {
        fn transmit(&self, _message: Message, _on_failure: Box<dyn FnOnce(RouterError) + Send>) {}
    }

    fn addr() -> Address {
        Address::Mqtt {
            broker_uri: "mqtt://b".into(),
            topic: "t1".into(),
        }
    }

    #[test]
    fn create_is_cached_per_address() {
        let created = Arc::new(AtomicUsize::new(0));
        let created_clone = created.clone();

        let mut factory = StubFactory::new();
        factory.register(
            AddressKind::Mqtt,
            Box::new(move |_addr| {
                created_clone.fetch_add(1, Ordering::SeqCst);
                Arc::new(CountingStub)
            }),
        );

        let a = factory.create(&addr()).unwrap();
        let b = factory.create(&addr()).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_creator_is_no_transport() {
        let factory = StubFactory::new();
        let err = factory.create(&addr()).unwrap_err();

        assert_eq!(err, RouterError::NoTransport);
    }

    #[test]
    fn remove_forces_recreate() {
        let created = Arc::new(AtomicUsize::new(0));
        let created_clone = created.clone();

        let mut factory = StubFactory::new();
        factory.register(
            AddressKind::Mqtt,
            Box::new(move |_addr| {
                created_clone.fetch_add(1, Ordering::SeqCst);
                Arc::new(CountingStub)
            }),
        );

        factory.create(&addr()).unwrap();
        factory.remove(&addr());
        factory.create(&addr()).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
