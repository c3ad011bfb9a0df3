//! Broker connection and endpoint configuration.
//!
//! Every field has a default matching the station's broker setup, so an
//! empty TOML table (or no file at all) yields a working session with a
//! local broker:
//!
//! ```toml
//! host = "localhost"
//! port = 1883
//! client_id = "mqtt_client"
//! keep_alive = 20
//! clean_session = true
//! ```

use std::time::Duration;

use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::TransferError;

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker TCP port.
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// MQTT client identifier. An empty value gets a random UUID at connect time.
    #[validate(length(max = 36, message = "Client ID must not exceed 36 characters"))]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep-alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Start every session without persisted state on the broker.
    pub clean_session: bool,

    /// Seconds to wait for CONNACK before giving up at startup.
    #[validate(range(min = 1, message = "Connect timeout must be at least 1 second"))]
    pub connect_timeout: u64,

    /// Seconds to wait for the acknowledgement of a single publish.
    #[validate(range(min = 1, message = "Ack timeout must be at least 1 second"))]
    pub ack_timeout: u64,

    /// Capacity of the client request queue.
    #[validate(range(min = 1, message = "Request channel capacity must be at least 1"))]
    pub request_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "mqtt_client".to_string(),
            keep_alive: 20,
            clean_session: true,
            connect_timeout: 10,
            ack_timeout: 10,
            request_channel_capacity: 10,
        }
    }
}

impl Config {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout)
    }
}

/// Where and how a message is published.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointMetadata {
    /// MQTT Quality of Service level (0, 1 or 2).
    #[validate(range(max = 2, message = "Invalid QoS value, must be 0, 1, or 2"))]
    pub qos: u8,

    /// Concrete publish topic, no wildcards.
    #[validate(
        length(min = 1, message = "Topic must not be empty"),
        custom(function = "validate_publish_topic")
    )]
    pub topic: String,

    /// Ask the broker to retain the last message on the topic.
    pub retain: bool,
}

impl Default for EndpointMetadata {
    fn default() -> Self {
        Self {
            qos: QoS::AtLeastOnce as u8,
            topic: "temp/humidity".to_string(),
            retain: false,
        }
    }
}

impl EndpointMetadata {
    /// Converts the numeric QoS into the `rumqttc` enum.
    pub fn qos(&self) -> Result<QoS, TransferError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(TransferError::InvalidMetadata(format!(
                "Invalid QoS value {other}, must be 0, 1, or 2"
            ))),
        }
    }
}

fn validate_publish_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.contains(['+', '#']) {
        let mut err = ValidationError::new("wildcard_topic");
        err.message = Some(format!("Publish topic must not contain wildcards: {topic}").into());
        return Err(err);
    }
    Ok(())
}
