//! Minute-aligned acquisition loop.
//!
//! Each wake-up runs one cycle in strict order: read both sensor channels,
//! append to the observation log, publish, pulse the heartbeat. Failures in
//! the log, publish and pulse steps are reported and the cycle carries on; a
//! malformed sensor value skips the rest of the cycle.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Local, Timelike};
use embedded_hal::digital::OutputPin;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    error::CycleError,
    heartbeat::{Heartbeat, HeartbeatError},
    observation_log::ObservationLog,
    reading::Reading,
    sensor::SensorReader,
    telemetry::Publisher,
};
use crate::config::station::StationConfig;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Time left until the next minute boundary.
///
/// A wake-up at second 0 waits a full minute. Leap seconds count as 59.
pub fn minute_alignment_delay(second: u32) -> Duration {
    Duration::from_secs(60 - u64::from(second.min(59)))
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub reading: Reading,
    pub logged: bool,
    pub published: bool,
    pub pulsed: bool,
}

pub struct Scheduler<P, C = SystemClock> {
    temperature: SensorReader,
    humidity: SensorReader,
    log: ObservationLog,
    publisher: Arc<dyn Publisher>,
    heartbeat: Heartbeat<P>,
    clock: C,
}

impl<P: OutputPin, C: Clock> Scheduler<P, C> {
    pub fn new(
        station: &StationConfig,
        publisher: Arc<dyn Publisher>,
        heartbeat: Heartbeat<P>,
        clock: C,
    ) -> Self {
        Self {
            temperature: SensorReader::new(&station.sensors.temperature_path),
            humidity: SensorReader::new(&station.sensors.humidity_path),
            log: ObservationLog::new(&station.observation_log.path),
            publisher,
            heartbeat,
            clock,
        }
    }

    /// Makes sure the log has its header and reports the last stored row.
    pub async fn prepare(&self) {
        if let Err(e) = self.log.ensure_header().await {
            warn!("Error preparing CSV file: {}", e);
            return;
        }
        match self.log.latest().await {
            Ok(Some(last)) => info!(
                "Last logged observation: {} {}C {}%",
                last.timestamp, last.temperature, last.humidity
            ),
            Ok(None) => info!("Observation log {} is empty", self.log.path().display()),
            Err(e) => warn!("Could not read back observation log: {}", e),
        }
    }

    pub fn next_delay(&self) -> Duration {
        minute_alignment_delay(self.clock.now().second())
    }

    /// Runs one acquisition cycle.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::Sensor` when a channel holds malformed content.
    /// Nothing is logged, published or pulsed in that case.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let timestamp = self.clock.now();
        let temperature = self.temperature.read().await?;
        let humidity = self.humidity.read().await?;
        let reading = Reading::new(timestamp, temperature, humidity);
        let payload = reading.payload();

        let logged = match self.log.append(&reading).await {
            Ok(()) => true,
            Err(e) => {
                error!("Error writing to CSV: {}", e);
                false
            }
        };

        let published = match self.publisher.publish(&payload).await {
            Ok(()) => true,
            Err(e) => {
                error!("MQTT publish error: {}", e);
                false
            }
        };

        let pulsed = match self.heartbeat.pulse().await {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        };

        let json = serde_json::to_string(&payload).unwrap_or_else(|_| format!("{:?}", payload));
        info!("Logged & Published: {}", json);

        Ok(CycleReport {
            reading,
            logged,
            published,
            pulsed,
        })
    }

    /// Loops until `cancel` fires, then releases the heartbeat line.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), HeartbeatError> {
        info!("Acquisition loop started");
        loop {
            let delay = self.next_delay();
            debug!("Next cycle in {:?}", delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Acquisition loop stopping");
                    break;
                }
                _ = sleep(delay) => {}
            }

            if let Err(e) = self.run_cycle().await {
                error!("Cycle skipped: {}", e);
            }
        }
        self.heartbeat.release()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::TimeZone;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    use super::*;
    use crate::core::{
        observation_log::HEADER,
        testing::{FailingPin, FixedClock, MockPublisher, RecordingPin},
    };

    const PULSE: Duration = Duration::from_millis(1);

    struct Station {
        dir: TempDir,
        config: StationConfig,
    }

    impl Station {
        fn new(temperature: Option<&str>, humidity: Option<&str>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = StationConfig::default();
            config.sensors.temperature_path = dir.path().join("in_temp_input");
            config.sensors.humidity_path = dir.path().join("in_humidityrelative_input");
            config.observation_log.path = dir.path().join("dht_data.csv");
            if let Some(raw) = temperature {
                std::fs::write(&config.sensors.temperature_path, raw).unwrap();
            }
            if let Some(raw) = humidity {
                std::fs::write(&config.sensors.humidity_path, raw).unwrap();
            }
            Self { dir, config }
        }

        fn csv(&self) -> Vec<String> {
            read_lines(&self.config.observation_log.path)
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn at_second(second: u32) -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2025, 3, 1, 12, 34, second).unwrap())
    }

    fn scheduler(
        station: &Station,
        publisher: Arc<MockPublisher>,
        pin: RecordingPin,
        clock: FixedClock,
    ) -> Scheduler<RecordingPin, FixedClock> {
        Scheduler::new(&station.config, publisher, Heartbeat::new(pin, PULSE), clock)
    }

    #[test]
    fn test_alignment_delay() {
        assert_eq!(minute_alignment_delay(0), Duration::from_secs(60));
        assert_eq!(minute_alignment_delay(1), Duration::from_secs(59));
        assert_eq!(minute_alignment_delay(30), Duration::from_secs(30));
        assert_eq!(minute_alignment_delay(59), Duration::from_secs(1));
        assert_eq!(minute_alignment_delay(60), Duration::from_secs(1));
    }

    #[test]
    fn test_next_delay_uses_clock() {
        let station = Station::new(None, None);
        let scheduler = scheduler(
            &station,
            Arc::new(MockPublisher::default()),
            RecordingPin::default(),
            at_second(45),
        );
        assert_eq!(scheduler.next_delay(), Duration::from_secs(15));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_cycle_end_to_end() {
        let station = Station::new(Some("23456\n"), Some("54321\n"));
        let publisher = Arc::new(MockPublisher::default());
        let pin = RecordingPin::default();
        let mut scheduler = scheduler(&station, publisher.clone(), pin.clone(), at_second(0));

        let report = scheduler.run_cycle().await.unwrap();

        assert!(report.logged && report.published && report.pulsed);
        assert_eq!(report.reading.temperature_celsius(), 23.456);
        assert_eq!(report.reading.humidity_percent(), 54.321);

        let payloads = publisher.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].timestamp, "2025-03-01 12:34:00");
        assert_eq!(payloads[0].temperature, 23.456);
        assert_eq!(payloads[0].humidity, 54.321);

        assert_eq!(station.csv(), vec![HEADER, "2025-03-01 12:34:00,23.456,54.321"]);
        assert_eq!(pin.levels(), vec![true, false]);
        assert!(logs_contain(
            r#"Logged & Published: {"timestamp":"2025-03-01 12:34:00","temperature":23.456,"humidity":54.321}"#
        ));
    }

    #[tokio::test]
    async fn test_existing_log_gets_single_row() {
        let station = Station::new(Some("20000"), Some("40000"));
        std::fs::write(
            &station.config.observation_log.path,
            format!("{}\n2025-03-01 12:33:00,19.5,41\n", HEADER),
        )
        .unwrap();
        let mut scheduler = scheduler(
            &station,
            Arc::new(MockPublisher::default()),
            RecordingPin::default(),
            at_second(0),
        );

        scheduler.prepare().await;
        scheduler.run_cycle().await.unwrap();

        let csv = station.csv();
        assert_eq!(csv.len(), 3);
        assert_eq!(csv[0], HEADER);
        assert_eq!(csv[2], "2025-03-01 12:34:00,20,40");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_publish_failure_keeps_csv_row() {
        let station = Station::new(Some("21000"), Some("50000"));
        let publisher = Arc::new(MockPublisher::failing());
        let pin = RecordingPin::default();
        let mut scheduler = scheduler(&station, publisher.clone(), pin.clone(), at_second(0));

        let first = scheduler.run_cycle().await.unwrap();
        let second = scheduler.run_cycle().await.unwrap();

        assert!(first.logged && !first.published);
        assert!(second.logged && !second.published);
        assert_eq!(station.csv().len(), 3);
        assert_eq!(pin.levels(), vec![true, false, true, false]);
        assert!(logs_contain("MQTT publish error"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_csv_failure_still_publishes() {
        let mut station = Station::new(Some("21000"), Some("50000"));
        station.config.observation_log.path = station.dir.path().join("absent").join("dht_data.csv");
        let publisher = Arc::new(MockPublisher::default());
        let mut scheduler = scheduler(&station, publisher.clone(), RecordingPin::default(), at_second(0));

        let report = scheduler.run_cycle().await.unwrap();

        assert!(!report.logged && report.published);
        assert_eq!(publisher.payloads().len(), 1);
        assert!(logs_contain("Error writing to CSV"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_heartbeat_failure_is_reported_in_cycle() {
        let station = Station::new(Some("21000"), Some("50000"));
        let publisher = Arc::new(MockPublisher::default());
        let mut scheduler = Scheduler::new(
            &station.config,
            publisher.clone(),
            Heartbeat::new(FailingPin, PULSE),
            at_second(0),
        );

        let report = scheduler.run_cycle().await.unwrap();

        assert!(report.logged && report.published && !report.pulsed);
        assert!(logs_contain("Failed to drive heartbeat line high"));
    }

    #[tokio::test]
    async fn test_malformed_sensor_skips_cycle() {
        let station = Station::new(Some("garbage"), Some("50000"));
        let publisher = Arc::new(MockPublisher::default());
        let pin = RecordingPin::default();
        let mut scheduler = scheduler(&station, publisher.clone(), pin.clone(), at_second(0));

        let err = scheduler.run_cycle().await.unwrap_err();

        assert!(matches!(err, CycleError::Sensor(_)));
        assert!(publisher.payloads().is_empty());
        assert!(station.csv().is_empty());
        assert!(pin.levels().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_sensor_reports_sentinel() {
        let station = Station::new(None, Some("50000"));
        let publisher = Arc::new(MockPublisher::default());
        let mut scheduler = scheduler(&station, publisher.clone(), RecordingPin::default(), at_second(0));

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.reading.temperature_celsius(), -0.001);
        assert_eq!(publisher.payloads()[0].temperature, -0.001);
        assert_eq!(station.csv()[1], "2025-03-01 12:34:00,-0.001,50");
        assert!(logs_contain("Failed to open"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_prepare_creates_header_and_reports_last_row() {
        let station = Station::new(None, None);
        let scheduler = scheduler(
            &station,
            Arc::new(MockPublisher::default()),
            RecordingPin::default(),
            at_second(0),
        );

        scheduler.prepare().await;
        assert_eq!(station.csv(), vec![HEADER]);
        assert!(logs_contain("is empty"));

        std::fs::write(
            &station.config.observation_log.path,
            format!("{}\n2025-03-01 12:33:00,19.5,41\n", HEADER),
        )
        .unwrap();
        scheduler.prepare().await;
        assert!(logs_contain("Last logged observation: 2025-03-01 12:33:00 19.5C 41%"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_alignment_sleep() {
        let station = Station::new(Some("20000"), Some("40000"));
        let publisher = Arc::new(MockPublisher::default());
        let pin = RecordingPin::default();
        let scheduler = scheduler(&station, publisher.clone(), pin.clone(), at_second(30));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(scheduler.run(cancel.clone()));
        sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert!(publisher.payloads().is_empty());
        assert_eq!(pin.levels(), vec![false]);
        assert!(!pin.is_high());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_cycle() {
        let station = Station::new(Some("20000"), Some("40000"));
        let publisher = Arc::new(MockPublisher::default());
        let pin = RecordingPin::default();
        let scheduler = scheduler(&station, publisher.clone(), pin.clone(), at_second(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        scheduler.run(cancel).await.unwrap();

        assert!(publisher.payloads().is_empty());
        assert_eq!(pin.levels(), vec![false]);
    }
}
