//! dhtpulse: minute-aligned temperature/humidity logger and MQTT publisher.
//!
//! Once a minute the agent reads a DHT-class sensor through its Linux IIO
//! sysfs attributes, appends the reading to a CSV file, publishes it as JSON
//! over MQTT (QoS 1, waiting for the broker's acknowledgement) and blinks a
//! GPIO-driven LED as a liveness signal.
//!
//! ## Modules
//!
//! * `config`: TOML configuration with `validator` rules and built-in
//!   defaults matching the reference wiring.
//! * `core`: sensor reader, heartbeat, observation log, publishing seam and
//!   the cycle scheduler.
//! * `logger`: `tracing` subscriber setup (console and optional journald).

pub mod config;
pub mod core;
pub mod logger;
