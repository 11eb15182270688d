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

use std::fmt;

use crate::routing_table::ParticipantId;

/// Error taxonomy for the router core.
///
/// These are reported to the caller's own callback (`route`'s
/// `on_failure`, or the `on_error` of a multicast receiver operation);
/// there is no process-wide error channel.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Destination participant is unknown and no parent is available to
    /// resolve it. Only raised for multicast receiver operations; the
    /// unicast `route` path enqueues instead of failing.
    #[error("participant '{0}' could not be resolved")]
    Unresolved(ParticipantId),

    /// A required transport skeleton or stub factory creator is missing.
    #[error("no transport registered for this address kind")]
    NoTransport,

    /// The message's TTL was reached before it could be delivered.
    #[error("message expired before delivery")]
    Expired,

    /// The message queue for a destination overflowed; the oldest
    /// non-expired entry was evicted to make room.
    #[error("message queue is full")]
    QueueFull,

    /// The parent router proxy is unreachable. Parent-delegated mutations
    /// queue themselves for retry and are replayed automatically once the
    /// host calls `Router::notify_parent_reconnected`.
    #[error("parent router is unreachable")]
    ParentDown,

    /// A malformed address, an empty participant id, or some other
    /// structurally invalid input. Never enqueued, never retried.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// A multicast receiver operation did not complete within its
    /// configured timeout.
    #[error("operation timed out")]
    Timeout,
}

impl RouterError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        RouterError::Invalid(msg.into())
    }
}

/// Convenience alias used throughout the crate for fallible router
/// operations that report via [`RouterError`].
pub type Result<T> = std::result::Result<T, RouterError>;

/// Failure handed to a `route()` caller's failure callback.
#[derive(Debug, Clone)]
pub struct MessageNotSent {
    pub message_id: String,
    pub to: ParticipantId,
    pub cause: RouterError,
}

impl fmt::Display for MessageNotSent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "message {} to '{}' was not sent: {}",
            self.message_id, self.to, self.cause
        )
    }
}
