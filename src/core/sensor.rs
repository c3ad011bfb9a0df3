//! Sysfs numeric attribute reader.
//!
//! IIO drivers expose samples as text in milli-units, e.g. `23456` in
//! `in_temp_input` for 23.456 °C. A missing or unreadable attribute yields
//! the sentinel `-1` raw (`-0.001` scaled) so the cycle can still complete;
//! content that is not a number is an error.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, trace};

/// Divisor turning raw milli-units into physical units.
pub const MILLI_SCALE: f64 = 1000.0;

/// Raw value reported when the attribute cannot be read.
pub const SENTINEL_RAW: f64 = -1.0;

#[derive(Error, Debug)]
pub enum SensorError {
    /// The attribute was readable but did not hold a finite number.
    #[error("Failed to parse sensor value from {path}: {reason} (content: {content:?})")]
    Malformed {
        path: String,
        content: String,
        reason: String,
    },
}

/// Reader for one sysfs attribute.
#[derive(Debug, Clone)]
pub struct SensorReader {
    path: PathBuf,
}

impl SensorReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the attribute and returns the scaled value.
    ///
    /// Open or read failures are logged and produce the scaled sentinel.
    /// Content that is not UTF-8 text counts as malformed. The attribute is
    /// read exactly once per call.
    pub async fn read(&self) -> Result<f64, SensorError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let content = String::from_utf8(bytes).map_err(|e| SensorError::Malformed {
                    path: self.path.display().to_string(),
                    content: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                    reason: e.utf8_error().to_string(),
                })?;
                let raw = parse_raw(&self.path, &content)?;
                trace!("{}: raw {}", self.path.display(), raw);
                Ok(scale(raw))
            }
            Err(e) => {
                error!("Error: Failed to open {}: {}", self.path.display(), e);
                Ok(scale(SENTINEL_RAW))
            }
        }
    }
}

/// Converts a raw milli-unit sample to physical units.
pub fn scale(raw: f64) -> f64 {
    raw / MILLI_SCALE
}

/// Parses the first whitespace-separated token as a finite number.
fn parse_raw(path: &Path, content: &str) -> Result<f64, SensorError> {
    let malformed = |reason: &str| SensorError::Malformed {
        path: path.display().to_string(),
        content: content.to_string(),
        reason: reason.to_string(),
    };

    let token = content
        .split_whitespace()
        .next()
        .ok_or_else(|| malformed("attribute is empty"))?;

    let value: f64 = token
        .parse()
        .map_err(|e: std::num::ParseFloatError| malformed(&e.to_string()))?;

    if !value.is_finite() {
        return Err(malformed("value is not finite"));
    }
    Ok(value)
}
