//! Notification hooks invoked by the connection driver.

use tracing::{trace, warn};

/// Capability interface for broker notifications.
///
/// Every method has a default that only logs, so implementors override just
/// the hooks they care about. Hooks run on the driver task and must not block.
pub trait BrokerCallbacks: Send + Sync {
    /// The link to the broker dropped. No reconnection follows.
    fn on_connection_lost(&self, cause: &str) {
        warn!("Connection lost: {}", cause);
    }

    /// The broker acknowledged the publish with the given packet id.
    fn on_delivery_complete(&self, pkid: u16) {
        trace!("Delivery complete for packet {}", pkid);
    }

    /// A message arrived on a subscribed topic.
    fn on_message(&self, topic: &str, payload: &[u8]) {
        trace!("Message on '{}' ({} bytes)", topic, payload.len());
    }
}

/// Callbacks that only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCallbacks;

impl BrokerCallbacks for LoggingCallbacks {}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    #[traced_test]
    fn test_default_connection_lost_logs_cause() {
        LoggingCallbacks.on_connection_lost("keep-alive timeout");
        assert!(logs_contain("Connection lost: keep-alive timeout"));
    }

    #[test]
    #[traced_test]
    fn test_other_hooks_are_quiet_by_default() {
        LoggingCallbacks.on_delivery_complete(3);
        LoggingCallbacks.on_message("temp/humidity", b"{}");
        assert!(!logs_contain("Connection lost"));
    }
}
