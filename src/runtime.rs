//! Recorder runtime - ingestion loop from line source to egress
//!
//! One task owns the aggregator and processes each line fully before reading
//! the next. Closed windows go to [`Egress::emit`], which never blocks on the
//! network. The loop ends when the source closes or `shutdown` resolves; the
//! window that is still open at that point is discarded.

use crate::aggregator_core::{WindowAggregator, WindowStats};
use crate::config::{NetworkTarget, RecorderConfig, SourceKind};
use crate::sink_core::{
    spawn_delivery_worker, BatchSink, DailyJsonlWriter, Egress, HttpPoster, MqttPublisher,
    SinkError,
};
use crate::streamer_core::{IngressError, LineSource, LogReader, SensorBridge};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

const RATE_LOG_INTERVAL: Duration = Duration::from_secs(10);
const LINE_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    IngressClosed,
    IngressFailed,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub lines: u64,
    pub stats: WindowStats,
    /// Devices with samples in the window that was open when the run stopped
    pub discarded_devices: usize,
}

/// Open the configured file sink and start the network delivery worker
pub fn build_egress(config: &RecorderConfig) -> Result<Egress, SinkError> {
    let file = match &config.data_dir {
        Some(dir) => Some(DailyJsonlWriter::new(dir)?),
        None => None,
    };

    let sink: Option<Arc<dyn BatchSink>> = match &config.network {
        None => None,
        Some(NetworkTarget::Http { url }) => Some(Arc::new(HttpPoster::new(url.clone())?)),
        Some(NetworkTarget::Mqtt {
            host,
            port,
            topic,
            client_id,
        }) => Some(Arc::new(MqttPublisher::connect(host, *port, client_id, topic.clone()))),
    };
    let network = sink.map(|sink| spawn_delivery_worker(sink).0);

    Ok(Egress::new(file, network))
}

/// Open the configured line source; spawns the bridge for [`SourceKind::Bridge`]
pub async fn build_source(config: &RecorderConfig) -> Result<LineSource, IngressError> {
    match config.source {
        SourceKind::Bridge => Ok(LineSource::Bridge(SensorBridge::spawn(
            &config.bridge_bin,
            &config.bridge_device,
        )?)),
        SourceKind::Stdin => Ok(LineSource::stdin()),
        SourceKind::File => {
            let path = config.input_path.as_ref().ok_or_else(|| {
                IngressError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no input file configured",
                ))
            })?;
            let mut reader = LogReader::new(path, config.follow);
            reader.start().await?;
            Ok(LineSource::Log(reader))
        }
    }
}

/// Resolves on CTRL+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("❌ Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("❌ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("⚠️  Received CTRL+C, shutting down..."),
        _ = terminate => log::info!("⚠️  Received SIGTERM, shutting down..."),
    }
}

fn preview(line: &str) -> String {
    if line.chars().count() <= LINE_PREVIEW_CHARS {
        line.to_string()
    } else {
        let head: String = line.chars().take(LINE_PREVIEW_CHARS).collect();
        format!("{}…", head)
    }
}

/// Run the ingestion loop until the source closes or `shutdown` resolves
pub async fn run_recorder<S>(
    mut source: LineSource,
    mut aggregator: WindowAggregator,
    mut egress: Egress,
    shutdown: S,
) -> RunSummary
where
    S: Future<Output = ()>,
{
    log::info!("🚀 Starting ingestion from {}", source.describe());
    log::info!("   ├─ Window interval: {}s", aggregator.interval());
    log::info!(
        "   ├─ File sink: {}",
        if egress.has_file() { "enabled" } else { "disabled" }
    );
    log::info!("   └─ Network sink: {}", egress.network_type().unwrap_or("none"));

    tokio::pin!(shutdown);

    let mut lines = 0u64;
    let mut lines_since_log = 0u64;
    let mut last_log_time = Instant::now();

    let reason = loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                break StopReason::Shutdown;
            }

            line_result = source.next_line() => {
                match line_result {
                    Ok(Some(line)) => {
                        lines += 1;
                        lines_since_log += 1;

                        // Parse errors only cost the line; the window is untouched
                        match aggregator.ingest_line(&line) {
                            Ok(Some(batch)) => {
                                log::info!(
                                    "📦 Window closed at {}: {} device summaries",
                                    batch.closing_ts,
                                    batch.len()
                                );
                                egress.emit(batch);
                            }
                            Ok(None) => {}
                            Err(e) => log::warn!("⚠️  Skipping line: {} | {}", e, preview(&line)),
                        }

                        // Periodic throughput report
                        if last_log_time.elapsed() >= RATE_LOG_INTERVAL {
                            let per_sec = lines_since_log as f64 / last_log_time.elapsed().as_secs_f64();
                            let stats = aggregator.stats();
                            log::info!(
                                "📊 Ingestion rate: {:.2} lines/sec (total: {}, malformed: {}, windows: {})",
                                per_sec,
                                lines,
                                stats.malformed,
                                stats.flushes
                            );
                            last_log_time = Instant::now();
                            lines_since_log = 0;
                        }
                    }
                    Ok(None) => {
                        log::warn!("⚠️  Ingress closed, stopping ingestion");
                        break StopReason::IngressClosed;
                    }
                    Err(e) => {
                        log::error!("❌ Ingress read failed: {}", e);
                        break StopReason::IngressFailed;
                    }
                }
            }
        }
    };

    // Stop the bridge before reporting; the open window is never flushed
    source.shutdown().await;

    let discarded_devices = aggregator.device_count();
    if discarded_devices > 0 {
        log::info!(
            "🗑️  Discarding open window ({} devices, not flushed)",
            discarded_devices
        );
    }

    let summary = RunSummary {
        reason,
        lines,
        stats: aggregator.stats(),
        discarded_devices,
    };
    log::info!(
        "✅ Ingestion stopped ({:?}): {} lines, {} windows, {} malformed, {} dropped reductions",
        summary.reason,
        summary.lines,
        summary.stats.flushes,
        summary.stats.malformed,
        summary.stats.dropped_reductions
    );
    summary
}
