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

use crate::address::Address;
use crate::error::RouterError;
use crate::message::Message;

/// Computes the global multicast address a provider's publication must
/// also be sent to, so that participants reachable only via the global
/// transport still receive it.
pub trait MulticastAddressCalculator: Send + Sync {
    fn compute(&self, message: &Message) -> Result<Address, RouterError>;
}

/// MQTT-topic-per-multicast-id calculator: the common case for a root
/// router whose global transport is an MQTT broker. The topic is the
/// multicast id verbatim.
pub struct MqttMulticastAddressCalculator {
    broker_uri: String,
}

impl MqttMulticastAddressCalculator {
    pub fn new(broker_uri: impl Into<String>) -> Self {
        MqttMulticastAddressCalculator {
            broker_uri: broker_uri.into(),
        }
    }
}

impl MulticastAddressCalculator for MqttMulticastAddressCalculator {
    fn compute(&self, message: &Message) -> Result<Address, RouterError> {
        Ok(Address::Mqtt {
            broker_uri: self.broker_uri.clone(),
            topic: message.to.clone(),
        })
    }
}

/// For child routers the "global" address to publish a local multicast
/// to is simply the parent's WebSocket address: the parent takes care
/// of further propagation.
pub struct WebSocketParentMulticastAddressCalculator {
    parent_address: Address,
}

impl WebSocketParentMulticastAddressCalculator {
    pub fn new(parent_address: Address) -> Self {
        WebSocketParentMulticastAddressCalculator { parent_address }
    }
}

impl MulticastAddressCalculator for WebSocketParentMulticastAddressCalculator {
    fn compute(&self, _message: &Message) -> Result<Address, RouterError> {
        Ok(self.parent_address.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use crate::routing_table::ParticipantId;
    use std::time::Duration;

    fn multicast_message(to: &str) -> Message {
        Message::new(
            "m1",
            ParticipantId::new("PP").unwrap(),
            to,
            MessageType::Multicast,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn mqtt_calculator_uses_multicast_id_as_topic() {
        let calc = MqttMulticastAddressCalculator::new("mqtt://globalTransport.example.com");
        let addr = calc.compute(&multicast_message("PP/news/a")).unwrap();

        assert_eq!(
            addr,
            Address::Mqtt {
                broker_uri: "mqtt://globalTransport.example.com".into(),
                topic: "PP/news/a".into(),
            }
        );
    }

    #[test]
    fn websocket_parent_calculator_returns_parent_address() {
        let parent = Address::WebSocketServer {
            url: "ws://parent".into(),
        };
        let calc = WebSocketParentMulticastAddressCalculator::new(parent.clone());

        assert_eq!(calc.compute(&multicast_message("PP/news/a")).unwrap(), parent);
    }
}
