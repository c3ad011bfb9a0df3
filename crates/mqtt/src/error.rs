//! Error type for broker connection and publish operations.
//!
//! Errors split into two groups by when they can occur:
//!
//! **Startup** (the caller is expected to exit):
//! - `ConfigError`: the `Config` failed validation
//! - `ConnectTimeout`, `ClientConnection`: the broker could not be reached
//!   or refused the session
//!
//! **Per publish** (the caller logs and carries on):
//! - `InvalidMetadata`, `Serialization`: the message itself is unusable
//! - `ClientTransfer`: the request queue is full or the event loop is gone
//! - `AckTimeout`, `ConnectionClosed`: the broker never acknowledged delivery

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Endpoint metadata carries a QoS outside 0..=2 or an empty topic.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The payload could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// The local client could not queue the request.
    ///
    /// Happens when the request channel is full or the event loop driver has
    /// stopped after a lost connection.
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// Network-level failure or CONNACK refusal.
    ///
    /// Boxed because `rumqttc::ConnectionError` is large.
    #[error("Client connection error: {0}")]
    ClientConnection(Box<rumqttc::ConnectionError>),

    /// No CONNACK arrived within the connect timeout.
    #[error("Timed out after {0:?} waiting for the broker to accept the session")]
    ConnectTimeout(Duration),

    /// The publish was queued but its acknowledgement did not arrive in time.
    #[error("No acknowledgement for packet {pkid} within {timeout:?}")]
    AckTimeout { pkid: u16, timeout: Duration },

    /// The event loop driver has exited; nothing will be delivered anymore.
    #[error("Broker connection is closed")]
    ConnectionClosed,
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}
