//! Per-cycle LED pulse.
//!
//! The pulse is the last step of a cycle, so holding the line high never
//! delays logging or publication.

use std::time::Duration;

use embedded_hal::digital::OutputPin;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

/// High phase used when nothing else is configured.
pub const DEFAULT_PULSE: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
#[error("Failed to drive heartbeat line {level}: {reason}")]
pub struct HeartbeatError {
    level: &'static str,
    reason: String,
}

/// Owns the indicator line for the process lifetime.
pub struct Heartbeat<P> {
    pin: P,
    pulse: Duration,
}

impl<P: OutputPin> Heartbeat<P> {
    pub fn new(pin: P, pulse: Duration) -> Self {
        Self { pin, pulse }
    }

    /// Drives the line high, holds it for the pulse duration, drives it low.
    pub async fn pulse(&mut self) -> Result<(), HeartbeatError> {
        self.pin.set_high().map_err(|e| drive_error("high", e))?;
        sleep(self.pulse).await;
        self.pin.set_low().map_err(|e| drive_error("low", e))
    }

    /// Leaves the line low and gives up ownership of it.
    pub fn release(mut self) -> Result<(), HeartbeatError> {
        let result = self.pin.set_low().map_err(|e| drive_error("low", e));
        drop(self.pin);
        info!("Heartbeat line released");
        result
    }
}

fn drive_error<E: std::fmt::Debug>(level: &'static str, err: E) -> HeartbeatError {
    debug!("Heartbeat pin error: {:?}", err);
    HeartbeatError {
        level,
        reason: format!("{:?}", err),
    }
}
