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

//! The parent-router client, used by child routers to
//! delegate routing-table and multicast-receiver mutations concerning
//! remotely reachable providers.
//!
//! Modeled as explicit continuations rather than shared mutable
//! closures: every method takes a callback that
//! is invoked exactly once with the result, so the router core never
//! blocks a worker thread waiting on parent RPC.

use crate::address::Address;
use crate::error::RouterError;
use crate::routing_table::ParticipantId;

pub type ResolveReply = Box<dyn FnOnce(Option<Address>) + Send>;
pub type AckReply = Box<dyn FnOnce(Result<(), RouterError>) + Send>;

/// An injected proxy to a parent router, so the router core is testable
/// without a live parent. All methods are asynchronous and idempotent
/// from the router's
/// perspective; a duplicate reply for a request the router already
/// resolved is simply ignored.
pub trait ParentRouterProxy: Send + Sync {
    fn resolve_next_hop(&self, participant_id: ParticipantId, reply: ResolveReply);

    fn add_next_hop(
        &self,
        participant_id: ParticipantId,
        address: Address,
        is_globally_visible: bool,
        reply: AckReply,
    );

    fn remove_next_hop(&self, participant_id: ParticipantId, reply: AckReply);

    fn add_multicast_receiver(
        &self,
        multicast_id: String,
        subscriber: ParticipantId,
        provider: ParticipantId,
        reply: AckReply,
    );

    fn remove_multicast_receiver(
        &self,
        multicast_id: String,
        subscriber: ParticipantId,
        provider: ParticipantId,
        reply: AckReply,
    );
}

/// A parent proxy that is always down. Used as the default `reply`
/// behavior for a router that was never promoted to child mode would
/// need one; mostly useful as a test double for exercising
/// `ParentDown` retries.
pub struct UnreachableParentRouter;

impl ParentRouterProxy for UnreachableParentRouter {
    fn resolve_next_hop(&self, _participant_id: ParticipantId, reply: ResolveReply) {
        reply(None);
    }

    fn add_next_hop(
        &self,
        _participant_id: ParticipantId,
        _address: Address,
        _is_globally_visible: bool,
        reply: AckReply,
    ) {
        reply(Err(RouterError::ParentDown));
    }

    fn remove_next_hop(&self, _participant_id: ParticipantId, reply: AckReply) {
        reply(Err(RouterError::ParentDown));
    }

    fn add_multicast_receiver(
        &self,
        _multicast_id: String,
        _subscriber: ParticipantId,
        _provider: ParticipantId,
        reply: AckReply,
    ) {
        reply(Err(RouterError::ParentDown));
    }

    fn remove_multicast_receiver(
        &self,
        _multicast_id: String,
        _subscriber: ParticipantId,
        _provider: ParticipantId,
        reply: AckReply,
    ) {
        reply(Err(RouterError::ParentDown));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn unreachable_parent_reports_parent_down() {
        let parent = UnreachableParentRouter;
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        parent.remove_next_hop(
            ParticipantId::new("P1").unwrap(),
            Box::new(move |res| {
                assert_eq!(res.unwrap_err(), RouterError::ParentDown);
                called_clone.store(true, Ordering::SeqCst);
            }),
        );

        assert!(called.load(Ordering::SeqCst));
    }
}
