use std::{
    process,
    sync::{Arc, OnceLock},
};

use dhtpulse::{
    config::Config,
    core::{
        error::StartupError,
        gpio::GpioLine,
        heartbeat::Heartbeat,
        scheduler::{Scheduler, SystemClock},
        telemetry::Publisher,
    },
    logger::LoggerManager,
    print_error,
};
use dhtpulse_mqtt::{Connection, LoggingCallbacks};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = config();
    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting dhtpulse version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.transport);

    if let Err(e) = run(cfg).await {
        error!("{}", e);
        print_error!("{}", e);
        process::exit(1);
    }
    info!("Shutdown complete");
}

async fn run(cfg: &Config) -> Result<(), StartupError> {
    let connection = Arc::new(Connection::connect(&cfg.transport, Arc::new(LoggingCallbacks)).await?);
    debug!("MQTT session state: {}", connection.state());

    let line = match GpioLine::request(&cfg.station.gpio) {
        Ok(line) => line,
        Err(e) => {
            connection.close().await;
            return Err(e.into());
        }
    };
    info!(
        "Heartbeat on {} line {}",
        cfg.station.gpio.chip.display(),
        cfg.station.gpio.line
    );

    let publisher = match dhtpulse_mqtt::Publisher::new(connection.clone(), cfg.station.telemetry.clone()) {
        Ok(publisher) => publisher,
        Err(e) => {
            connection.close().await;
            return Err(e.into());
        }
    };
    let endpoint = publisher.metadata();
    info!(
        "Publishing to '{}' (QoS {}, retain {})",
        endpoint.topic, endpoint.qos, endpoint.retain
    );

    let scheduler = Scheduler::new(
        &cfg.station,
        Arc::new(publisher) as Arc<dyn Publisher>,
        Heartbeat::new(line, cfg.station.gpio.pulse()),
        SystemClock,
    );
    scheduler.prepare().await;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    if let Err(e) = scheduler.run(cancel).await {
        warn!("Failed to release heartbeat line: {}", e);
    }
    connection.close().await;
    Ok(())
}

/// Cancels `cancel` on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
    cancel.cancel();
}
