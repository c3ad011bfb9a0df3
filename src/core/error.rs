use dhtpulse_mqtt::TransferError;
use thiserror::Error;

use super::{gpio::GpioError, sensor::SensorError};

/// A cycle that produced no reading.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Sensor read failed: {0}")]
    Sensor(#[from] SensorError),
}

/// Failures that stop the process before the first cycle.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to connect to MQTT broker: {0}")]
    Broker(#[from] TransferError),

    #[error("Failed to acquire heartbeat line: {0}")]
    Gpio(#[from] GpioError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_converts() {
        let err: CycleError = SensorError::Malformed {
            path: "/sys/in_temp_input".into(),
            content: "abc".into(),
            reason: "invalid float literal".into(),
        }
        .into();
        assert!(err.to_string().starts_with("Sensor read failed"));
        assert!(err.to_string().contains("/sys/in_temp_input"));
    }

    #[test]
    fn test_broker_error_converts() {
        let err: StartupError = TransferError::ConnectionClosed.into();
        assert!(matches!(err, StartupError::Broker(_)));
    }
}
