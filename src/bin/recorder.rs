//! Recorder Binary - Windowed Sensor Telemetry
//!
//! Reads JSON sensor readings from the sensor bridge (or stdin / a recorded
//! log), closes a shared event-time window every `RECORDER_INTERVAL` seconds
//! and writes one summary per device to the day file and the optional
//! network sink.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin recorder
//! cargo run --release --bin recorder -- --source file --input capture.jsonl --no-file
//! ./recv-sensors hci0 | cargo run --release --bin recorder -- --source stdin
//! ```
//!
//! See `sensorflow::config` for the environment variables. `RUST_LOG`
//! controls logging (default: info).

use sensorflow::aggregator_core::WindowAggregator;
use sensorflow::config::RecorderConfig;
use sensorflow::runtime::{build_egress, build_source, run_recorder, shutdown_signal};
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = RecorderConfig::from_env()?;

    log::info!("🚀 Starting sensorflow recorder");
    log::info!("   Source: {:?}", config.source);
    if let Some(path) = &config.input_path {
        log::info!("   Input: {}{}", path.display(), if config.follow { " (follow)" } else { "" });
    }
    log::info!("   Bridge: {} {}", config.bridge_bin, config.bridge_device);
    match &config.data_dir {
        Some(dir) => log::info!("   Data dir: {}", dir.display()),
        None => log::info!("   Data dir: disabled"),
    }
    log::info!("   Network: {:?}", config.network);

    let egress = build_egress(&config)?;
    let source = build_source(&config).await?;
    let aggregator = WindowAggregator::new(config.interval_secs);

    run_recorder(source, aggregator, egress, shutdown_signal()).await;

    if config.network.is_some() {
        // In-flight deliveries get a moment to finish; they are not awaited
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    log::info!("✅ Recorder stopped");
    Ok(())
}
