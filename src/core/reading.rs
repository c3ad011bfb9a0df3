//! The per-cycle observation and its wire representation.

use chrono::{DateTime, Local, SubsecRound};
use serde::{Deserialize, Serialize};

/// Timestamp layout shared by the CSV log and the telemetry payload.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One sample of both channels, taken right after the minute boundary.
///
/// Created once per cycle and never retained past it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    timestamp: DateTime<Local>,
    temperature_celsius: f64,
    humidity_percent: f64,
}

impl Reading {
    /// Builds a reading, truncating the timestamp to whole seconds.
    pub fn new(timestamp: DateTime<Local>, temperature_celsius: f64, humidity_percent: f64) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            temperature_celsius,
            humidity_percent,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// `YYYY-MM-DD HH:MM:SS` in local time.
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn temperature_celsius(&self) -> f64 {
        self.temperature_celsius
    }

    pub fn humidity_percent(&self) -> f64 {
        self.humidity_percent
    }

    pub fn payload(&self) -> TelemetryPayload {
        TelemetryPayload {
            timestamp: self.formatted_timestamp(),
            temperature: self.temperature_celsius,
            humidity: self.humidity_percent,
        }
    }
}

/// JSON document published per cycle.
///
/// ```json
/// { "timestamp": "2025-03-01 12:34:00", "temperature": 23.456, "humidity": 54.321 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
}

impl From<&Reading> for TelemetryPayload {
    fn from(reading: &Reading) -> Self {
        reading.payload()
    }
}
