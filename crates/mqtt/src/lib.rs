//! # dhtpulse-mqtt
//!
//! A deliberately small MQTT layer on top of `rumqttc` for a station that
//! publishes one message per minute and cares about each one arriving:
//!
//! - one broker session per process, established once at startup
//! - publishes wait for the broker's acknowledgement before returning
//! - no reconnection: a lost link is reported and later publishes fail
//! - notification hooks through the [`BrokerCallbacks`] trait
//!
//! ```ignore
//! let connection = Arc::new(Connection::connect(&config, Arc::new(LoggingCallbacks)).await?);
//! let publisher = Publisher::new(connection.clone(), EndpointMetadata::default())?;
//! publisher.publish(&reading).await?;
//! connection.close().await;
//! ```

pub mod callback;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod publisher;
pub mod state;

pub use callback::{BrokerCallbacks, LoggingCallbacks};
pub use client::ClientBuilder;
pub use config::{Config, EndpointMetadata};
pub use connection::{Connection, DeliveryEvent};
pub use error::TransferError;
pub use publisher::Publisher;
pub use state::ConnectionState;
