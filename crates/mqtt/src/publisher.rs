//! Acknowledged JSON publishing over the shared [`Connection`].
//!
//! `publish` returns only after the broker has confirmed delivery (PUBACK for
//! QoS 1, PUBCOMP for QoS 2). This makes a publish a blocking step of the
//! caller's cycle: the next step does not start until the broker has the data
//! or the ack timeout has elapsed.

use std::sync::Arc;

use rumqttc::QoS;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, trace};
use validator::Validate;

use super::{
    config::EndpointMetadata,
    connection::{Connection, DeliveryEvent, DeliveryQueue},
    error::TransferError,
};

/// Publishes serialisable values to one fixed endpoint.
#[derive(Clone)]
pub struct Publisher {
    connection: Arc<Connection>,
    metadata: EndpointMetadata,
}

impl Publisher {
    /// Binds a publisher to an endpoint after validating its metadata.
    pub fn new(connection: Arc<Connection>, metadata: EndpointMetadata) -> Result<Self, TransferError> {
        metadata.validate()?;
        Ok(Self {
            connection,
            metadata,
        })
    }

    pub fn metadata(&self) -> &EndpointMetadata {
        &self.metadata
    }

    /// Serialises `data` as JSON, publishes it and waits for delivery.
    ///
    /// Returns the packet id of the delivered message (0 for QoS 0).
    pub async fn publish<T: Serialize + ?Sized>(&self, data: &T) -> Result<u16, TransferError> {
        let payload = serde_json::to_vec(data)?;
        let qos = self.metadata.qos()?;

        // Held until the ack arrives so acks cannot be attributed to another message.
        let mut deliveries = self.connection.deliveries().await;
        deliveries.discard_stale();

        self.connection.client().try_publish(
            self.metadata.topic.as_str(),
            qos,
            self.metadata.retain,
            payload,
        )?;
        trace!("Queued publish to '{}'", self.metadata.topic);

        let ack_timeout = self.connection.ack_timeout();
        let mut sent = None;
        let delivered = timeout(ack_timeout, await_delivery(&mut deliveries, qos, &mut sent)).await;
        let Ok(result) = delivered else {
            if sent.is_none() {
                deliveries.abandon_unsent();
            }
            return Err(TransferError::AckTimeout {
                pkid: sent.unwrap_or_default(),
                timeout: ack_timeout,
            });
        };
        let pkid = result?;

        debug!("Delivered packet {} to '{}'", pkid, self.metadata.topic);
        Ok(pkid)
    }
}

/// Waits for our PUBLISH to leave and, for QoS > 0, for its acknowledgement.
async fn await_delivery(
    deliveries: &mut DeliveryQueue,
    qos: QoS,
    sent: &mut Option<u16>,
) -> Result<u16, TransferError> {
    loop {
        match deliveries.next().await {
            None => return Err(TransferError::ConnectionClosed),
            Some(DeliveryEvent::Sent(pkid)) if sent.is_none() => {
                if qos == QoS::AtMostOnce {
                    return Ok(pkid);
                }
                *sent = Some(pkid);
            }
            Some(DeliveryEvent::Acked(pkid)) if *sent == Some(pkid) => return Ok(pkid),
            Some(other) => trace!("Ignoring unrelated delivery event {:?}", other),
        }
    }
}
