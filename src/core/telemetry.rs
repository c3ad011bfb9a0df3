//! Publishing seam between the scheduler and the broker transport.

use super::reading::TelemetryPayload;

/// Something that delivers one telemetry document per cycle.
///
/// The scheduler only needs success or failure; the MQTT publisher below is
/// the production implementation.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        payload: &TelemetryPayload,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait::async_trait]
impl Publisher for dhtpulse_mqtt::Publisher {
    async fn publish(
        &self,
        payload: &TelemetryPayload,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        dhtpulse_mqtt::Publisher::publish(self, payload)
            .await
            .map(|_pkid| ())
            .map_err(|e| Box::new(e) as _)
    }
}
