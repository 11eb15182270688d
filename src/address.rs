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

//! The address model: a value-comparable, hashable, serializable sum
//! type of transport endpoints. Equality is structural and addresses
//! are immutable once constructed.

use serde::{Deserialize, Serialize};

/// A transport endpoint. Dispatch on the variant, never on an inheritance
/// hierarchy, is how both the stub factory and the multicast resolution
/// table pick their behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// A participant hosted in this very process.
    InProcess { skeleton_id: String },
    /// A WebSocket server this process runs, reachable by clients.
    WebSocketServer { url: String },
    /// A client connected to one of our WebSocket servers.
    WebSocketClient { ccid: String },
    /// An MQTT broker + topic pair (the global transport in most
    /// deployments).
    Mqtt { broker_uri: String, topic: String },
    /// An HTTP long-poll channel.
    HttpChannel { base_url: String, channel_id: String },
    /// A browser/binder address for WebView or in-device IPC binder
    /// transports, kept distinct from `WebSocketClient` because its
    /// validity does not depend on a live socket.
    Browser { binder_id: String },
}

impl Address {
    /// The tag used to key per-kind stub creators and multicast
    /// skeleton registrations. Kept separate from `Address` itself
    /// because a creator is registered once per kind, not once per
    /// concrete address.
    pub fn kind(&self) -> AddressKind {
        match self {
            Address::InProcess { .. } => AddressKind::InProcess,
            Address::WebSocketServer { .. } => AddressKind::WebSocketServer,
            Address::WebSocketClient { .. } => AddressKind::WebSocketClient,
            Address::Mqtt { .. } => AddressKind::Mqtt,
            Address::HttpChannel { .. } => AddressKind::HttpChannel,
            Address::Browser { .. } => AddressKind::Browser,
        }
    }

    /// True for addresses that are reachable without leaving this
    /// process — the "provider is locally hosted" test used to decide
    /// whether a local multicast publication also needs a global hop.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Address::InProcess { .. } | Address::WebSocketClient { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    InProcess,
    WebSocketServer,
    WebSocketClient,
    Mqtt,
    HttpChannel,
    Browser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        let a = Address::Mqtt {
            broker_uri: "mqtt://b".into(),
            topic: "t1".into(),
        };
        let b = Address::Mqtt {
            broker_uri: "mqtt://b".into(),
            topic: "t1".into(),
        };
        let c = Address::Mqtt {
            broker_uri: "mqtt://b".into(),
            topic: "t2".into(),
        };

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn local_addresses_are_identified() {
        assert!(Address::InProcess {
            skeleton_id: "p1".into()
        }
        .is_local());
        assert!(Address::WebSocketClient {
            ccid: "c1".into()
        }
        .is_local());
        assert!(!Address::Mqtt {
            broker_uri: "mqtt://b".into(),
            topic: "t".into()
        }
        .is_local());
        assert!(!Address::WebSocketServer {
            url: "ws://x".into()
        }
        .is_local());
    }

    #[test]
    fn json_round_trip() {
        let addr = Address::HttpChannel {
            base_url: "https://x".into(),
            channel_id: "c1".into(),
        };

        let ser = serde_json::to_string(&addr).unwrap();
        let back: Address = serde_json::from_str(&ser).unwrap();

        assert_eq!(addr, back);
    }
}
