//! Output line on a Linux GPIO character device.

use std::path::PathBuf;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use thiserror::Error;
use tracing::info;

use crate::config::station::GpioConfig;

#[derive(Error, Debug)]
pub enum GpioError {
    #[error("Unable to open GPIO chip {path}")]
    ChipOpen {
        path: PathBuf,
        #[source]
        source: gpio_cdev::errors::Error,
    },

    #[error("Unable to configure GPIO line {line} on {path}")]
    LineRequest {
        path: PathBuf,
        line: u32,
        #[source]
        source: gpio_cdev::errors::Error,
    },

    #[error("Failed to set GPIO line {line} to {value}")]
    SetValue {
        line: u32,
        value: u8,
        #[source]
        source: gpio_cdev::errors::Error,
    },
}

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// An exclusively requested output line. The kernel releases the line when
/// this value is dropped.
pub struct GpioLine {
    handle: LineHandle,
    line: u32,
}

impl GpioLine {
    /// Opens the chip and requests the line as an output driven low.
    pub fn request(config: &GpioConfig) -> Result<Self, GpioError> {
        let mut chip = Chip::new(&config.chip).map_err(|source| GpioError::ChipOpen {
            path: config.chip.clone(),
            source,
        })?;

        let line_request = |source: gpio_cdev::errors::Error| GpioError::LineRequest {
            path: config.chip.clone(),
            line: config.line,
            source,
        };
        let handle = chip
            .get_line(config.line)
            .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, &config.consumer))
            .map_err(line_request)?;

        info!(
            "GPIO line {} on {} requested as '{}'",
            config.line,
            config.chip.display(),
            config.consumer
        );
        Ok(Self {
            handle,
            line: config.line,
        })
    }

    fn set(&mut self, value: u8) -> Result<(), GpioError> {
        self.handle
            .set_value(value)
            .map_err(|source| GpioError::SetValue {
                line: self.line,
                value,
                source,
            })
    }
}

impl ErrorType for GpioLine {
    type Error = GpioError;
}

impl OutputPin for GpioLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(0)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(1)
    }
}
