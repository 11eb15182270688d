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

//! Messages routed by the core. A `Message` is immutable once
//! enqueued; `expiry` is an absolute wall-clock instant the router
//! compares itself, never a caller-supplied duration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::address::Address;
use crate::routing_table::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Reply,
    OneWay,
    SubscriptionRequest,
    SubscriptionReply,
    SubscriptionStop,
    Publication,
    Multicast,
}

impl MessageType {
    pub fn is_multicast(self) -> bool {
        matches!(self, MessageType::Multicast)
    }
}

/// A routable message. `to` holds a `ParticipantId` for unicast types and
/// a multicast id (`providerParticipantId/name[/partition...]`) for
/// `MessageType::Multicast`.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub from: ParticipantId,
    pub to: String,
    pub msg_type: MessageType,
    pub expiry: Instant,
    pub received_from_global: bool,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
    /// Diagnostics-only reply address, carried over from the richer
    /// header set of the original wire format. Never consulted for
    /// routing decisions.
    pub reply_to: Option<Address>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        from: ParticipantId,
        to: impl Into<String>,
        msg_type: MessageType,
        ttl: Duration,
    ) -> Self {
        Message {
            id: id.into(),
            from,
            to: to.into(),
            msg_type,
            expiry: Instant::now() + ttl,
            received_from_global: false,
            payload: Vec::new(),
            headers: HashMap::new(),
            reply_to: None,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiry
    }

    pub fn remaining_ttl(&self, now: Instant) -> Option<Duration> {
        self.expiry.checked_duration_since(now)
    }

    pub fn received_from_global(mut self, flag: bool) -> Self {
        self.received_from_global = flag;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_in_the_past_is_detected() {
        let msg = Message::new(
            "m1",
            ParticipantId::new("P1").unwrap(),
            "P2",
            MessageType::OneWay,
            Duration::from_millis(0),
        );

        // `ttl = 0` means `expiry == now` at construction; by the time we
        // check, `now` has moved past it.
        std::thread::sleep(Duration::from_millis(5));
        assert!(msg.is_expired(Instant::now()));
    }

    #[test]
    fn multicast_classification() {
        assert!(MessageType::Multicast.is_multicast());
        assert!(!MessageType::Request.is_multicast());
    }
}
