//! Local view of the broker session lifecycle.
//!
//! The session only ever moves forward:
//!
//! ```text
//! Disconnected ──(connect)──> Connecting ──(CONNACK)──> Connected
//! ```
//!
//! `Connected` is terminal for the lifetime of the process. A lost link is
//! reported through [`BrokerCallbacks::on_connection_lost`](crate::BrokerCallbacks)
//! and surfaces as failing publishes, but it does not move the state back:
//! there is no reconnection path that could make use of it.

use std::fmt;

/// Current state of the broker session as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has been made yet.
    Disconnected,

    /// CONNECT has been sent and the client is waiting for CONNACK.
    Connecting,

    /// The broker accepted the session.
    Connected,
}

impl ConnectionState {
    /// Returns a short identifier for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }

    /// Returns true once the broker has accepted the session.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Checks whether moving to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Disconnected, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Connected)
        )
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
