//! Construction of the `rumqttc` client and event loop from [`Config`].
//!
//! ```ignore
//! let (client, event_loop) = ClientBuilder::from_config(&config)?.build();
//! ```

use rumqttc::{AsyncClient, EventLoop, MqttOptions};
use tracing::debug;
use validator::Validate;

use super::{config::Config, error::TransferError};

/// Builder that turns a validated [`Config`] into a client/event loop pair.
///
/// The two halves belong together: the client queues requests, the event
/// loop has to be polled for anything to reach the network.
pub struct ClientBuilder {
    opts: MqttOptions,
    cap: usize,
}

impl ClientBuilder {
    /// Creates a builder with explicit endpoint settings and library defaults
    /// for everything else.
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16, cap: usize) -> Self {
        Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
        }
    }

    /// Creates a builder from configuration, validating it first.
    ///
    /// An empty `client_id` is replaced with a random UUID, since the broker
    /// rejects empty identifiers for clean sessions on some versions.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        config.validate()?;

        let client_id = if config.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.client_id.clone()
        };

        let mut builder = Self::new(
            client_id,
            config.host.clone(),
            config.port,
            config.request_channel_capacity,
        );
        builder.opts.set_keep_alive(config.keep_alive());
        builder.opts.set_clean_session(config.clean_session);

        debug!(
            "MQTT client options: {}:{} id={} keep_alive={}s clean_session={}",
            config.host,
            config.port,
            builder.opts.client_id(),
            config.keep_alive,
            config.clean_session
        );
        Ok(builder)
    }

    pub fn client_id(&self) -> String {
        self.opts.client_id()
    }

    /// Consumes the builder and creates the client and its event loop.
    ///
    /// Nothing is sent until the event loop is polled.
    pub fn build(self) -> (AsyncClient, EventLoop) {
        AsyncClient::new(self.opts, self.cap)
    }
}
