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

//! Message router core for a distributed request/reply/multicast
//! messaging framework.
//!
//! This crate implements only the router: a persistent routing table, a
//! time-bounded message queue, a pluggable messaging-stub factory, a
//! multicast subscription registry, and parent/child delegation for
//! hierarchical deployments. Transports, serialization, discovery and
//! bootstrap are the host application's responsibility; the router only
//! consumes the [`stub::MessagingStub`] and [`multicast::MulticastSubscriber`]
//! interfaces they expose.

pub mod address;
pub mod config;
pub mod error;
pub mod message;
pub mod multicast;
pub mod parent;
pub mod persistence;
pub mod queue;
pub mod router;
pub mod routing_table;
pub mod security;
pub mod stub;
mod worker;

pub use address::Address;
pub use config::RouterConfig;
pub use error::{MessageNotSent, RouterError};
pub use message::{Message, MessageType};
pub use router::{FailureCallback, MulticastAckCallback, MulticastErrorCallback, Router, RouterMetricsSnapshot};
pub use routing_table::ParticipantId;
pub use security::SecurityManager;
