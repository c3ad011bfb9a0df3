//! Acquisition runtime: sensor input, heartbeat output, CSV persistence,
//! the publishing seam and the minute-aligned scheduler that ties them
//! together.

pub mod error;
pub mod gpio;
pub mod heartbeat;
pub mod observation_log;
pub mod reading;
pub mod scheduler;
pub mod sensor;
pub mod telemetry;

/// Hand-written fakes shared by the unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::{
        convert::Infallible,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use chrono::{DateTime, Local};
    use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
    use tokio::time::Instant;

    use super::{reading::TelemetryPayload, scheduler::Clock, telemetry::Publisher};

    /// Records every level written, with the time it was written.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingPin {
        writes: Arc<Mutex<Vec<(bool, Instant)>>>,
    }

    impl RecordingPin {
        pub fn levels(&self) -> Vec<bool> {
            self.writes.lock().unwrap().iter().map(|(level, _)| *level).collect()
        }

        pub fn is_high(&self) -> bool {
            self.writes
                .lock()
                .unwrap()
                .last()
                .map(|(level, _)| *level)
                .unwrap_or(false)
        }

        /// Length of every completed high phase.
        pub fn high_durations(&self) -> Vec<Duration> {
            let writes = self.writes.lock().unwrap();
            writes
                .windows(2)
                .filter_map(|pair| match pair {
                    [(true, rose), (false, fell)] => Some(fell.duration_since(*rose)),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, level: bool) {
            self.writes.lock().unwrap().push((level, Instant::now()));
        }
    }

    impl ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.record(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.record(true);
            Ok(())
        }
    }

    #[derive(Debug)]
    pub struct PinFault;

    impl digital::Error for PinFault {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// A line whose every write fails.
    pub struct FailingPin;

    impl ErrorType for FailingPin {
        type Error = PinFault;
    }

    impl OutputPin for FailingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(PinFault)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(PinFault)
        }
    }

    #[derive(Default)]
    pub struct MockPublisher {
        payloads: Mutex<Vec<TelemetryPayload>>,
        fail: bool,
    }

    impl MockPublisher {
        /// Rejects every publish, like a dropped broker session.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn payloads(&self) -> Vec<TelemetryPayload> {
            self.payloads.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Publisher for MockPublisher {
        async fn publish(
            &self,
            payload: &TelemetryPayload,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail {
                return Err("connection closed".into());
            }
            self.payloads.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    pub struct FixedClock(pub DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }
}
