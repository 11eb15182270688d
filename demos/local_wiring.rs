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

//! Example wiring for a standalone ("root") router: the host owns an
//! MQTT connection and a set of in-process providers, and hands the
//! router one `MessagingStub` creator per transport kind plus a
//! multicast calculator pointed at its global broker. Not part of the
//! library; copy and adapt this for a real host.

use std::sync::Arc;

use msg_router::address::AddressKind;
use msg_router::error::RouterError;
use msg_router::multicast::{MqttMulticastAddressCalculator, MulticastSubscriberRegistry};
use msg_router::stub::{MessagingStub, MessagingStubFactory, StubFactory};
use msg_router::{Address, Message, MessageType, ParticipantId, Router, RouterConfig};

/// A trivial in-process stub: providers living in this same address
/// space are called directly, with no transport hop at all.
struct InProcessStub {
    skeleton_id: String,
}

impl MessagingStub for InProcessStub {
    fn transmit(&self, message: Message, on_failure: Box<dyn FnOnce(RouterError) + Send>) {
        match deliver_to_local_skeleton(&self.skeleton_id, &message) {
            Ok(()) => {}
            Err(e) => on_failure(e),
        }
    }
}

/// Placeholder for whatever the host uses to reach a locally registered
/// provider (a channel, a direct function call, a binder transaction).
fn deliver_to_local_skeleton(_skeleton_id: &str, _message: &Message) -> Result<(), RouterError> {
    Ok(())
}

/// A stub backed by an already-connected MQTT client. The host owns the
/// actual `rumqttc`/`paho-mqtt` client and publish loop; this merely
/// adapts it to `MessagingStub`.
struct MqttStub {
    topic: String,
}

impl MessagingStub for MqttStub {
    fn transmit(&self, message: Message, on_failure: Box<dyn FnOnce(RouterError) + Send>) {
        if let Err(e) = publish(&self.topic, &message.payload) {
            on_failure(e);
        }
    }
}

fn publish(_topic: &str, _payload: &[u8]) -> Result<(), RouterError> {
    Ok(())
}

/// Build a root router: loads its config, registers one stub creator
/// per transport kind it speaks, and wires a global multicast
/// calculator pointed at the host's own MQTT broker.
pub fn build_router(config: RouterConfig, mqtt_broker_uri: String) -> Arc<Router> {
    let mut stub_factory = StubFactory::new();

    stub_factory.register(
        AddressKind::InProcess,
        Box::new(|address| match address {
            Address::InProcess { skeleton_id } => Arc::new(InProcessStub {
                skeleton_id: skeleton_id.clone(),
            }),
            _ => unreachable!("registered under InProcess kind"),
        }),
    );

    stub_factory.register(
        AddressKind::Mqtt,
        Box::new(|address| match address {
            Address::Mqtt { topic, .. } => Arc::new(MqttStub {
                topic: topic.clone(),
            }),
            _ => unreachable!("registered under Mqtt kind"),
        }),
    );

    let multicast_subscribers = MulticastSubscriberRegistry::new();
    // A root router with a real MQTT connection would also register a
    // `MulticastSubscriber` skeleton here so locally-subscribed remote
    // multicasts turn into MQTT SUBSCRIBEs.

    Router::new(
        config,
        Arc::new(stub_factory) as Arc<dyn MessagingStubFactory>,
        Arc::new(multicast_subscribers),
        Arc::new(MqttMulticastAddressCalculator::new(mqtt_broker_uri)),
        None,
    )
}

/// Route a one-way message to a participant, logging (rather than
/// panicking on) delivery failure. A real host ties `on_failure` back
/// into whatever reported the send in the first place (an RPC promise,
/// a retry queue of its own).
pub fn send_one_way(router: &Arc<Router>, from: ParticipantId, to: &str, payload: Vec<u8>) {
    let message = Message::new(
        uuid_like_id(),
        from,
        to,
        MessageType::OneWay,
        std::time::Duration::from_secs(30),
    )
    .with_payload(payload);

    router.route(
        message,
        Some(Box::new(|not_sent| {
            log::warn!("{not_sent}");
        })),
    );
}

fn uuid_like_id() -> String {
    // A real host uses a proper UUID crate; this demo only needs a
    // distinct-enough id to thread through retries.
    format!("msg-{:x}", std::ptr::addr_of!(uuid_like_id) as usize)
}
