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

//! The router core: ties the routing table, the message
//! queue, the stub factory, the multicast directory and an optional
//! parent delegate together into the object a host embeds.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::address::{Address, AddressKind};
use crate::config::RouterConfig;
use crate::error::{MessageNotSent, RouterError};
use crate::message::Message;
use crate::multicast::{
    MulticastAddressCalculator, MulticastReceiverDirectory, MulticastSubscriber,
    MulticastSubscriberRegistry,
};
use crate::parent::ParentRouterProxy;
use crate::persistence;
use crate::queue::{MessageQueue, QueuedItem};
use crate::routing_table::{ParticipantId, RoutingEntry, RoutingTable};
use crate::security::SecurityManager;
use crate::stub::MessagingStubFactory;
use crate::worker::{jittered, DispatchPool, Scheduler};

/// Callback for a `route()` call that could not be delivered.
pub type FailureCallback = Box<dyn FnOnce(MessageNotSent) + Send>;

/// Internal callback type; `RouterError` only, the destination and
/// message id are already known to whoever holds the closure.
type InternalFailure = Box<dyn FnOnce(RouterError) + Send>;

pub type MulticastAckCallback = Box<dyn FnOnce() + Send>;
pub type MulticastErrorCallback = Box<dyn FnOnce(RouterError) + Send>;

struct ParentState {
    proxy: Arc<dyn ParentRouterProxy>,
    #[allow(dead_code)]
    address: Address,
    #[allow(dead_code)]
    participant_id: ParticipantId,
}

/// A parent-delegated mutation that failed with `ParentDown` and is
/// waiting to be retried once the host signals the parent is reachable
/// again via [`Router::notify_parent_reconnected`].
type ParentRetryJob = Box<dyn FnOnce(&Arc<Router>, &Arc<ParentState>) + Send>;

/// Lets a multicast receiver operation's `on_success`/`on_error` pair be
/// raced between a parent reply and a timeout, while still firing
/// exactly once.
struct MulticastReplyOnce {
    completed: AtomicBool,
    on_success: Mutex<Option<MulticastAckCallback>>,
    on_error: Mutex<Option<MulticastErrorCallback>>,
}

impl MulticastReplyOnce {
    fn new(on_success: MulticastAckCallback, on_error: MulticastErrorCallback) -> Arc<Self> {
        Arc::new(MulticastReplyOnce {
            completed: AtomicBool::new(false),
            on_success: Mutex::new(Some(on_success)),
            on_error: Mutex::new(Some(on_error)),
        })
    }

    fn succeed(&self) -> bool {
        if self.completed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            if let Some(cb) = self.on_success.lock().take() {
                cb();
            }
            true
        } else {
            false
        }
    }

    fn fail(&self, err: RouterError) -> bool {
        if self.completed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            if let Some(cb) = self.on_error.lock().take() {
                cb(err);
            }
            true
        } else {
            false
        }
    }
}

/// A read-only snapshot of the router's internal counters, exposed for
/// host-side diagnostics (no metrics export transport is part of this
/// crate; a host wires these into whatever it already uses).
#[derive(Debug, Clone, Copy)]
pub struct RouterMetricsSnapshot {
    pub routing_table_len: usize,
    pub queued_message_count: usize,
    pub multicast_receiver_count: usize,
}

/// The message router core.
///
/// Constructed via [`Router::new`], which returns an `Arc<Router>`: the
/// dispatch pool, the timer thread and parent-resolution continuations
/// all need to hand a `Router` handle to another thread, so the router
/// is always shared, never owned outright by its host.
pub struct Router {
    config: RouterConfig,
    routing_table: RoutingTable,
    queue: MessageQueue,
    stub_factory: Arc<dyn MessagingStubFactory>,
    multicast_directory: MulticastReceiverDirectory,
    multicast_subscribers: Arc<MulticastSubscriberRegistry>,
    multicast_calculator: Arc<dyn MulticastAddressCalculator>,
    security_manager: Option<Arc<dyn SecurityManager>>,
    parent: Mutex<Option<Arc<ParentState>>>,
    pending_parent_retries: Mutex<Vec<ParentRetryJob>>,
    dispatch_pool: DispatchPool,
    scheduler: Scheduler,
}

impl Router {
    /// Build a router, loading any provisioned entries from
    /// `config.persistence_path`.
    pub fn new(
        config: RouterConfig,
        stub_factory: Arc<dyn MessagingStubFactory>,
        multicast_subscribers: Arc<MulticastSubscriberRegistry>,
        multicast_calculator: Arc<dyn MulticastAddressCalculator>,
        security_manager: Option<Arc<dyn SecurityManager>>,
    ) -> Arc<Router> {
        let routing_table = RoutingTable::new();
        let persisted = persistence::load(&PathBuf::from(&config.persistence_path));
        let loaded = persisted.len();
        for (id, entry) in persisted {
            routing_table.insert(id, entry);
        }
        if loaded > 0 {
            info!("Loaded {loaded} provisioned routing entries from persistence");
        }

        let router = Arc::new(Router {
            queue: MessageQueue::new(config.queue_max_length),
            dispatch_pool: DispatchPool::new(config.workers),
            scheduler: Scheduler::start(),
            routing_table,
            stub_factory,
            multicast_directory: MulticastReceiverDirectory::new(),
            multicast_subscribers,
            multicast_calculator,
            security_manager,
            parent: Mutex::new(None),
            pending_parent_retries: Mutex::new(Vec::new()),
            config,
        });

        router.schedule_sweep();
        router
    }

    fn schedule_sweep(self: &Arc<Self>) {
        let router = self.clone();
        let interval = self.config.queue_sweep_interval();
        self.scheduler.schedule_after(interval, move || {
            router.queue.sweep_expired(Instant::now());
            router.schedule_sweep();
        });
    }

    /// Install the parent-router delegate that makes this router a
    /// child. May be called at most once; a second call
    /// returns `RouterError::Invalid`.
    pub fn set_parent_router(
        &self,
        proxy: Arc<dyn ParentRouterProxy>,
        address: Address,
        participant_id: ParticipantId,
    ) -> Result<(), RouterError> {
        let mut guard = self.parent.lock();
        if guard.is_some() {
            return Err(RouterError::invalid("setParentRouter called more than once"));
        }
        *guard = Some(Arc::new(ParentState {
            proxy,
            address,
            participant_id,
        }));
        Ok(())
    }

    fn parent_state(&self) -> Option<Arc<ParentState>> {
        self.parent.lock().clone()
    }

    pub fn is_child(&self) -> bool {
        self.parent.lock().is_some()
    }

    fn queue_parent_retry<F>(&self, job: F)
    where
        F: FnOnce(&Arc<Router>, &Arc<ParentState>) + Send + 'static,
    {
        self.pending_parent_retries.lock().push(Box::new(job));
    }

    /// Retry every parent-delegated mutation that previously failed with
    /// `ParentDown`. The host calls this once its parent connection is
    /// reestablished; a router that never saw a `ParentDown` reply has
    /// nothing queued and this is a no-op.
    pub fn notify_parent_reconnected(self: &Arc<Self>) {
        let jobs = std::mem::take(&mut *self.pending_parent_retries.lock());
        if jobs.is_empty() {
            return;
        }

        let parent = match self.parent_state() {
            Some(p) => p,
            None => return,
        };

        info!("Parent router reconnected; retrying {} outstanding request(s)", jobs.len());
        for job in jobs {
            job(self, &parent);
        }
    }

    /// Route a single message. `on_failure` is invoked at
    /// most once, iff the message could not ultimately be delivered.
    pub fn route(self: &Arc<Self>, message: Message, on_failure: Option<FailureCallback>) {
        if let Some(sm) = &self.security_manager {
            if !sm.validate(&message) {
                self.report_failure(
                    on_failure,
                    message.id.clone(),
                    message.to.clone(),
                    RouterError::invalid("message rejected by security manager"),
                );
                return;
            }
        }

        if message.msg_type.is_multicast() {
            self.route_multicast(message);
            return;
        }

        let now = Instant::now();
        if message.is_expired(now) {
            self.report_failure(on_failure, message.id.clone(), message.to.clone(), RouterError::Expired);
            return;
        }

        let to_id = match ParticipantId::new(message.to.clone()) {
            Ok(id) => id,
            Err(e) => {
                self.report_failure(on_failure, message.id.clone(), message.to.clone(), e);
                return;
            }
        };

        if message.received_from_global && !self.routing_table.contains(&to_id) {
            debug!("Dropping inbound global message to unknown participant '{to_id}' (loop prevention)");
            return;
        }

        let internal_cb = self.wrap_failure(message.id.clone(), to_id.clone(), on_failure);

        match self.routing_table.lookup(&to_id) {
            Some(entry) => {
                let initial_delay = self.config.dispatch_backoff_initial();
                self.dispatch_once(entry.address, message, initial_delay, internal_cb);
            }
            None => self.enqueue_unknown(to_id, message, internal_cb),
        }
    }

    fn wrap_failure(
        &self,
        message_id: String,
        to: ParticipantId,
        on_failure: Option<FailureCallback>,
    ) -> Option<InternalFailure> {
        on_failure.map(move |cb| {
            Box::new(move |cause: RouterError| {
                cb(MessageNotSent {
                    message_id,
                    to,
                    cause,
                });
            }) as InternalFailure
        })
    }

    fn report_failure(
        &self,
        on_failure: Option<FailureCallback>,
        message_id: String,
        to_raw: String,
        cause: RouterError,
    ) {
        if let Some(cb) = on_failure {
            let to = ParticipantId::new(to_raw).unwrap_or_else(|_| ParticipantId::new("?").unwrap());
            cb(MessageNotSent { message_id, to, cause });
        }
    }

    fn enqueue_unknown(self: &Arc<Self>, to_id: ParticipantId, message: Message, on_failure: Option<InternalFailure>) {
        self.queue.enqueue(
            to_id.clone(),
            QueuedItem {
                message,
                inserted_at: Instant::now(),
                on_failure,
            },
        );

        if let Some(parent) = self.parent_state() {
            let router = self.clone();
            let to_for_reply = to_id.clone();
            parent.proxy.resolve_next_hop(
                to_id,
                Box::new(move |maybe_address| {
                    if let Some(address) = maybe_address {
                        // A learned entry: not globally visible by itself, the
                        // parent already knows about it.
                        router.add_next_hop(to_for_reply, address, false);
                    }
                }),
            );
        }
    }

    fn drain_queue_for(self: &Arc<Self>, participant_id: &ParticipantId) {
        let items = self.queue.drain(participant_id);
        if items.is_empty() {
            return;
        }

        let entry = match self.routing_table.lookup(participant_id) {
            Some(e) => e,
            None => return,
        };

        let initial_delay = self.config.dispatch_backoff_initial();
        for item in items {
            let now = Instant::now();
            if item.message.is_expired(now) {
                if let Some(cb) = item.on_failure {
                    cb(RouterError::Expired);
                }
                continue;
            }
            self.dispatch_once(entry.address.clone(), item.message, initial_delay, item.on_failure);
        }
    }

    fn dispatch_once(
        self: &Arc<Self>,
        address: Address,
        message: Message,
        base_delay: Duration,
        on_failure: Option<InternalFailure>,
    ) {
        let stub = match self.stub_factory.create(&address) {
            Ok(s) => s,
            Err(_) => {
                if let Some(cb) = on_failure {
                    cb(RouterError::NoTransport);
                }
                return;
            }
        };

        let router = self.clone();
        let address_for_retry = address;
        let message_for_retry = message.clone();

        self.dispatch_pool.execute(move || {
            stub.transmit(
                message,
                Box::new(move |err| {
                    router.handle_dispatch_failure(address_for_retry, message_for_retry, base_delay, err, on_failure);
                }),
            );
        });
    }

    fn handle_dispatch_failure(
        self: &Arc<Self>,
        address: Address,
        message: Message,
        base_delay: Duration,
        _err: RouterError,
        on_failure: Option<InternalFailure>,
    ) {
        let now = Instant::now();
        let remaining = match message.remaining_ttl(now) {
            Some(r) if r > Duration::from_millis(0) => r,
            _ => {
                if let Some(cb) = on_failure {
                    cb(RouterError::Expired);
                }
                return;
            }
        };

        let max_delay = self.config.dispatch_backoff_max();
        let actual_delay = jittered(base_delay, self.config.dispatch_backoff_jitter).min(max_delay);

        if actual_delay >= remaining {
            if let Some(cb) = on_failure {
                cb(RouterError::Expired);
            }
            return;
        }

        let next_base_delay = base_delay.saturating_mul(2).min(max_delay);
        let router = self.clone();
        self.scheduler.schedule_after(actual_delay, move || {
            router.dispatch_once(address, message, next_base_delay, on_failure);
        });
    }

    /// Learn (or overwrite) a routing entry. Drains any
    /// messages queued under `participant_id`. In child mode the add is
    /// also forwarded to the parent so remote senders can reach this
    /// participant.
    pub fn add_next_hop(self: &Arc<Self>, participant_id: ParticipantId, address: Address, is_globally_visible: bool) {
        self.add_next_hop_internal(participant_id, address, is_globally_visible, false, true);
    }

    /// Add a provisioned (sticky) entry: persisted immediately, never
    /// forwarded to a parent.
    pub fn add_provisioned_next_hop(self: &Arc<Self>, participant_id: ParticipantId, address: Address) {
        self.add_next_hop_internal(participant_id, address, false, true, false);
    }

    fn add_next_hop_internal(
        self: &Arc<Self>,
        participant_id: ParticipantId,
        address: Address,
        is_globally_visible: bool,
        is_sticky: bool,
        forward_to_parent: bool,
    ) {
        let entry = RoutingEntry::new(address.clone(), is_globally_visible, is_sticky);
        self.routing_table.insert(participant_id.clone(), entry);

        if is_sticky {
            self.persist();
        }

        self.drain_queue_for(&participant_id);

        if forward_to_parent {
            if let Some(parent) = self.parent_state() {
                self.send_add_next_hop_to_parent(parent, participant_id, address, is_globally_visible);
            }
        }
    }

    fn send_add_next_hop_to_parent(
        self: &Arc<Self>,
        parent: Arc<ParentState>,
        participant_id: ParticipantId,
        address: Address,
        is_globally_visible: bool,
    ) {
        let router = self.clone();
        parent.proxy.add_next_hop(
            participant_id.clone(),
            address.clone(),
            is_globally_visible,
            Box::new(move |res| match res {
                Ok(()) => {}
                Err(RouterError::ParentDown) => {
                    warn!("Parent unreachable for addNextHop of '{participant_id}'; retrying on reconnect");
                    router.queue_parent_retry(move |router, parent| {
                        router.send_add_next_hop_to_parent(parent.clone(), participant_id, address, is_globally_visible);
                    });
                }
                Err(e) => warn!("Parent rejected addNextHop: {e}"),
            }),
        );
    }

    /// Delete a routing entry. Queued messages under
    /// `participant_id`, if any, are left in place: they are only
    /// discarded by TTL expiry, not by the entry's removal.
    pub fn remove_next_hop(self: &Arc<Self>, participant_id: &ParticipantId) {
        let removed = self.routing_table.remove(participant_id);

        if let Some(entry) = &removed {
            if entry.is_sticky {
                self.persist();
            }
        }

        if removed.is_some() {
            if let Some(parent) = self.parent_state() {
                self.send_remove_next_hop_to_parent(parent, participant_id.clone());
            }
        }
    }

    fn send_remove_next_hop_to_parent(self: &Arc<Self>, parent: Arc<ParentState>, participant_id: ParticipantId) {
        let router = self.clone();
        parent.proxy.remove_next_hop(
            participant_id.clone(),
            Box::new(move |res| match res {
                Ok(()) => {}
                Err(RouterError::ParentDown) => {
                    warn!("Parent unreachable for removeNextHop of '{participant_id}'; retrying on reconnect");
                    router.queue_parent_retry(move |router, parent| {
                        router.send_remove_next_hop_to_parent(parent.clone(), participant_id);
                    });
                }
                Err(e) => warn!("Parent rejected removeNextHop: {e}"),
            }),
        );
    }

    fn persist(&self) {
        let entries = self.routing_table.provisioned_entries();
        if let Err(e) = persistence::save(&PathBuf::from(&self.config.persistence_path), &entries) {
            warn!("Failed to persist routing table: {e}");
        }
    }

    /// Dispatch a multicast publication: fan out to every
    /// locally-known subscriber, and additionally republish to the
    /// global transport if the provider is locally hosted and this
    /// publication did not itself arrive from the global transport
    /// (loop prevention).
    fn route_multicast(self: &Arc<Self>, message: Message) {
        let multicast_id = message.to.clone();
        let subscribers = self.multicast_directory.subscribers(&multicast_id);

        for subscriber in &subscribers {
            match self.routing_table.lookup(subscriber) {
                Some(entry) => {
                    let mut copy = message.clone();
                    copy.to = subscriber.as_str().to_string();
                    let initial_delay = self.config.dispatch_backoff_initial();
                    self.dispatch_once(entry.address, copy, initial_delay, None);
                }
                None => {
                    warn!("Multicast subscriber '{subscriber}' for '{multicast_id}' has no routing entry; dropping");
                }
            }
        }

        if !message.received_from_global {
            if let Some(provider_entry) = self.routing_table.lookup(&message.from) {
                if provider_entry.address.is_local() {
                    match self.multicast_calculator.compute(&message) {
                        Ok(global_address) => {
                            let initial_delay = self.config.dispatch_backoff_initial();
                            self.dispatch_once(global_address, message, initial_delay, None);
                        }
                        Err(e) => {
                            warn!("Failed to compute global multicast address for '{multicast_id}': {e}");
                        }
                    }
                }
            }
        }
    }

    /// Register a subscriber for a multicast id, following the provider
    /// resolution table: in-process providers register locally, others
    /// delegate to a parent router if one is set, or else to the
    /// per-transport skeleton for that address kind. A parent-delegated
    /// call is bounded by `config.multicast_op_timeout`: if neither a
    /// reply nor a reconnect-triggered retry resolves it in time,
    /// `on_error` fires with `RouterError::Timeout`.
    pub fn add_multicast_receiver(
        self: &Arc<Self>,
        multicast_id: String,
        subscriber: ParticipantId,
        provider: ParticipantId,
        on_success: MulticastAckCallback,
        on_error: MulticastErrorCallback,
    ) {
        let provider_entry = match self.routing_table.lookup(&provider) {
            Some(e) => e,
            None => {
                on_error(RouterError::Unresolved(provider));
                return;
            }
        };

        match provider_entry.address.kind() {
            AddressKind::InProcess => {
                self.multicast_directory.add(&multicast_id, subscriber);
                on_success();
            }
            _ => {
                if let Some(parent) = self.parent_state() {
                    self.multicast_directory.add(&multicast_id, subscriber.clone());
                    let directory = self.multicast_directory_handle();
                    let reply = MulticastReplyOnce::new(on_success, on_error);

                    let directory_for_timeout = directory.clone();
                    let mid_for_timeout = multicast_id.clone();
                    let sub_for_timeout = subscriber.clone();
                    let reply_for_timeout = reply.clone();
                    self.scheduler.schedule_after(self.config.multicast_op_timeout(), move || {
                        if reply_for_timeout.fail(RouterError::Timeout) {
                            directory_for_timeout.remove(&mid_for_timeout, &sub_for_timeout);
                        }
                    });

                    self.send_add_multicast_receiver_to_parent(parent, multicast_id, subscriber, provider, directory, reply);
                } else {
                    let skeleton = match self.multicast_subscribers.get(provider_entry.address.kind()) {
                        Some(s) => s,
                        None => {
                            on_error(RouterError::NoTransport);
                            return;
                        }
                    };

                    let is_first = self.multicast_directory.add(&multicast_id, subscriber.clone());
                    if is_first {
                        if let Err(e) = skeleton.register_multicast_subscription(&multicast_id) {
                            self.multicast_directory.remove(&multicast_id, &subscriber);
                            on_error(e);
                            return;
                        }
                    }
                    on_success();
                }
            }
        }
    }

    fn send_add_multicast_receiver_to_parent(
        self: &Arc<Self>,
        parent: Arc<ParentState>,
        multicast_id: String,
        subscriber: ParticipantId,
        provider: ParticipantId,
        directory: RouterMulticastDirectoryHandle,
        reply: Arc<MulticastReplyOnce>,
    ) {
        let router = self.clone();
        parent.proxy.add_multicast_receiver(
            multicast_id.clone(),
            subscriber.clone(),
            provider.clone(),
            Box::new(move |res| match res {
                Ok(()) => {
                    reply.succeed();
                }
                Err(RouterError::ParentDown) => {
                    warn!("Parent unreachable for addMulticastReceiver '{multicast_id}'; retrying on reconnect");
                    router.queue_parent_retry(move |router, parent| {
                        router.send_add_multicast_receiver_to_parent(
                            parent.clone(),
                            multicast_id,
                            subscriber,
                            provider,
                            directory,
                            reply,
                        );
                    });
                }
                Err(e) => {
                    if reply.fail(e) {
                        directory.remove(&multicast_id, &subscriber);
                    }
                }
            }),
        );
    }

    /// Unregister a subscriber for a multicast id; mirrors
    /// [`Router::add_multicast_receiver`]'s resolution table.
    pub fn remove_multicast_receiver(
        self: &Arc<Self>,
        multicast_id: String,
        subscriber: ParticipantId,
        provider: ParticipantId,
        on_success: MulticastAckCallback,
        on_error: MulticastErrorCallback,
    ) {
        let provider_entry = match self.routing_table.lookup(&provider) {
            Some(e) => e,
            None => {
                on_error(RouterError::Unresolved(provider));
                return;
            }
        };

        match provider_entry.address.kind() {
            AddressKind::InProcess => {
                self.multicast_directory.remove(&multicast_id, &subscriber);
                on_success();
            }
            _ => {
                if let Some(parent) = self.parent_state() {
                    self.multicast_directory.remove(&multicast_id, &subscriber);
                    let directory = self.multicast_directory_handle();
                    let reply = MulticastReplyOnce::new(on_success, on_error);

                    let directory_for_timeout = directory.clone();
                    let mid_for_timeout = multicast_id.clone();
                    let sub_for_timeout = subscriber.clone();
                    let reply_for_timeout = reply.clone();
                    self.scheduler.schedule_after(self.config.multicast_op_timeout(), move || {
                        if reply_for_timeout.fail(RouterError::Timeout) {
                            directory_for_timeout.add(&mid_for_timeout, sub_for_timeout);
                        }
                    });

                    self.send_remove_multicast_receiver_to_parent(parent, multicast_id, subscriber, provider, directory, reply);
                } else {
                    let outcome = self.multicast_directory.remove(&multicast_id, &subscriber);
                    if outcome.was_last_for_multicast {
                        if let Some(skeleton) = self.multicast_subscribers.get(provider_entry.address.kind()) {
                            if let Err(e) = skeleton.unregister_multicast_subscription(&multicast_id) {
                                warn!("Failed to unregister multicast subscription for '{multicast_id}': {e}");
                            }
                        }
                    }
                    on_success();
                }
            }
        }
    }

    fn send_remove_multicast_receiver_to_parent(
        self: &Arc<Self>,
        parent: Arc<ParentState>,
        multicast_id: String,
        subscriber: ParticipantId,
        provider: ParticipantId,
        directory: RouterMulticastDirectoryHandle,
        reply: Arc<MulticastReplyOnce>,
    ) {
        let router = self.clone();
        parent.proxy.remove_multicast_receiver(
            multicast_id.clone(),
            subscriber.clone(),
            provider.clone(),
            Box::new(move |res| match res {
                Ok(()) => {
                    reply.succeed();
                }
                Err(RouterError::ParentDown) => {
                    warn!("Parent unreachable for removeMulticastReceiver '{multicast_id}'; retrying on reconnect");
                    router.queue_parent_retry(move |router, parent| {
                        router.send_remove_multicast_receiver_to_parent(
                            parent.clone(),
                            multicast_id,
                            subscriber,
                            provider,
                            directory,
                            reply,
                        );
                    });
                }
                Err(e) => {
                    if reply.fail(e) {
                        directory.add(&multicast_id, subscriber.clone());
                    }
                }
            }),
        );
    }

    /// A cloneable handle to the multicast directory for use inside
    /// `'static` rollback closures; the directory itself has no
    /// internal `Arc`, so the router hands out a thin wrapper instead of
    /// re-architecting it just for this one call site.
    fn multicast_directory_handle(self: &Arc<Self>) -> RouterMulticastDirectoryHandle {
        RouterMulticastDirectoryHandle(self.clone())
    }

    pub fn metrics(&self) -> RouterMetricsSnapshot {
        RouterMetricsSnapshot {
            routing_table_len: self.routing_table.len(),
            queued_message_count: self.queue.len(),
            multicast_receiver_count: self.multicast_directory.receiver_count(),
        }
    }

    /// Best-effort graceful shutdown: stops the timer thread, then waits
    /// up to `drain_deadline` for the dispatch pool to finish
    /// outstanding work before returning.
    pub fn shutdown(&self, drain_deadline: Duration) {
        self.scheduler.shutdown();
        if !self.dispatch_pool.join_with_timeout(drain_deadline) {
            warn!("Dispatch pool did not drain within {drain_deadline:?}; leaving outstanding work running");
        }
    }
}

/// See [`Router::multicast_directory_handle`].
#[derive(Clone)]
struct RouterMulticastDirectoryHandle(Arc<Router>);

impl RouterMulticastDirectoryHandle {
    fn remove(&self, multicast_id: &str, subscriber: &ParticipantId) {
        self.0.multicast_directory.remove(multicast_id, subscriber);
    }

    fn add(&self, multicast_id: &str, subscriber: ParticipantId) {
        self.0.multicast_directory.add(multicast_id, subscriber);
    }
}
