//! Append-only CSV record of every reading.
//!
//! ```text
//! Timestamp,Temperature(C),Humidity(%)
//! 2025-03-01 12:34:00,23.456,54.321
//! 2025-03-01 12:35:00,23.5,54.3
//! ```
//!
//! The file is opened in append mode for each record and closed again, so no
//! handle is held between cycles. The header is written only when the file
//! is empty at open time.

use std::{
    io,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, info};

use super::reading::{Reading, TIMESTAMP_FORMAT};

pub const HEADER: &str = "Timestamp,Temperature(C),Humidity(%)";

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to write observation log {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read observation log {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A data row read back from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRecord {
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
}

impl LoggedRecord {
    /// Parses `timestamp,temperature,humidity`. Anything else, including the
    /// header, yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().split(',');
        let timestamp = fields.next()?;
        let temperature = fields.next()?.trim().parse().ok()?;
        let humidity = fields.next()?.trim().parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        let timestamp = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            timestamp,
            temperature,
            humidity,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ObservationLog {
    path: PathBuf,
}

impl ObservationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file if needed and writes the header into an empty file.
    ///
    /// Returns whether the header was written.
    pub async fn ensure_header(&self) -> Result<bool, LogError> {
        let written = self.write_record(None).await?;
        if written {
            info!("Created observation log {}", self.path.display());
        }
        Ok(written)
    }

    /// Appends one data row, preceded by the header if the file is empty.
    pub async fn append(&self, reading: &Reading) -> Result<(), LogError> {
        let record = format_record(reading);
        self.write_record(Some(&record)).await?;
        debug!("Appended to {}: {}", self.path.display(), record);
        Ok(())
    }

    /// Returns the last well-formed data row, or `None` for a missing or
    /// header-only file.
    pub async fn latest(&self) -> Result<Option<LoggedRecord>, LogError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().rev().find_map(LoggedRecord::parse)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LogError::Read {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    /// Opens in append mode, adds the header when the file is empty, then the
    /// optional record. Flushes before the handle is dropped.
    async fn write_record(&self, record: Option<&str>) -> Result<bool, LogError> {
        let write_err = |source| LogError::Write {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;
        let is_empty = file.metadata().await.map_err(write_err)?.len() == 0;

        let mut buf = String::new();
        if is_empty {
            buf.push_str(HEADER);
            buf.push('\n');
        }
        if let Some(record) = record {
            buf.push_str(record);
            buf.push('\n');
        }

        if !buf.is_empty() {
            file.write_all(buf.as_bytes()).await.map_err(write_err)?;
            file.flush().await.map_err(write_err)?;
        }
        Ok(is_empty)
    }
}

/// `YYYY-MM-DD HH:MM:SS,<temperature>,<humidity>` with shortest float output.
pub fn format_record(reading: &Reading) -> String {
    format!(
        "{},{},{}",
        reading.formatted_timestamp(),
        reading.temperature_celsius(),
        reading.humidity_percent()
    )
}
