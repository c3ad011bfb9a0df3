//! Station wiring: sensor files, heartbeat GPIO, observation log, and the
//! telemetry endpoint.
//!
//! Defaults describe a DHT-class sensor bound to the kernel IIO driver as
//! `iio:device0`, an LED on line 20 of `/dev/gpiochip4`, and a CSV file in
//! the working directory.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use dhtpulse_mqtt::EndpointMetadata;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct StationConfig {
    #[validate(nested)]
    pub sensors: SensorsConfig,

    #[validate(nested)]
    pub gpio: GpioConfig,

    #[validate(nested)]
    pub observation_log: ObservationLogConfig,

    /// Topic, QoS and retain flag for the per-minute telemetry message.
    #[validate(nested)]
    pub telemetry: EndpointMetadata,
}

/// Sysfs attributes exposing raw samples in milli-units.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SensorsConfig {
    #[validate(custom(function = "validate_path"))]
    pub temperature_path: PathBuf,

    #[validate(custom(function = "validate_path"))]
    pub humidity_path: PathBuf,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            temperature_path: PathBuf::from("/sys/bus/iio/devices/iio:device0/in_temp_input"),
            humidity_path: PathBuf::from(
                "/sys/bus/iio/devices/iio:device0/in_humidityrelative_input",
            ),
        }
    }
}

/// Heartbeat LED line on a GPIO character device.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GpioConfig {
    #[validate(custom(function = "validate_path"))]
    pub chip: PathBuf,

    /// Line offset on the chip.
    pub line: u32,

    /// Consumer label shown by `gpioinfo`.
    #[validate(length(min = 1, max = 31, message = "Consumer label must be 1-31 characters"))]
    pub consumer: String,

    /// How long the line stays high per cycle, in milliseconds.
    #[validate(range(min = 1, max = 10000, message = "Pulse must be between 1 and 10000 ms"))]
    pub pulse_ms: u64,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: PathBuf::from("/dev/gpiochip4"),
            line: 20,
            consumer: "mqtt_blink".to_string(),
            pulse_ms: 200,
        }
    }
}

impl GpioConfig {
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservationLogConfig {
    /// CSV file, relative to the working directory unless absolute.
    #[validate(custom(function = "validate_path"))]
    pub path: PathBuf,
}

impl Default for ObservationLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dht_data.csv"),
        }
    }
}

fn validate_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        let mut err = ValidationError::new("empty_path");
        err.message = Some("Path must not be empty".into());
        return Err(err);
    }
    Ok(())
}
