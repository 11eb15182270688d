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

//! Multicast support: computing the global publication address for an
//! outgoing multicast and tracking which local
//! participants are subscribed to which multicast id.

mod calculator;
mod directory;

pub use calculator::{
    MqttMulticastAddressCalculator, MulticastAddressCalculator,
    WebSocketParentMulticastAddressCalculator,
};
pub use directory::{MulticastReceiverDirectory, MulticastSubscriberRegistry, RemovalOutcome};

use crate::error::RouterError;

/// A transport-specific receive handle for multicast. For MQTT this
/// turns "this provider exports multicast X" into a native SUBSCRIBE;
/// for WebSocket it registers interest with the remote peer.
pub trait MulticastSubscriber: Send + Sync {
    fn register_multicast_subscription(&self, multicast_id: &str) -> Result<(), RouterError>;
    fn unregister_multicast_subscription(&self, multicast_id: &str) -> Result<(), RouterError>;
}
