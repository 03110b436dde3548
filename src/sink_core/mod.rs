//! Sink Core - Batch Egress
//!
//! ```text
//! WindowAggregator → Batch → Egress
//!                              ├─ DailyJsonlWriter (inline, append to YYYYMMDD.json)
//!                              └─ DeliveryQueue → detached task → HttpPoster | MqttPublisher
//! ```

pub mod delivery;
pub mod http_poster;
pub mod jsonl_writer;
pub mod mqtt_publisher;
pub mod writer_backend;

pub use delivery::{spawn_delivery_worker, DeliveryQueue};
pub use http_poster::HttpPoster;
pub use jsonl_writer::DailyJsonlWriter;
pub use mqtt_publisher::MqttPublisher;
pub use writer_backend::{BatchSink, SinkError};

use crate::aggregator_core::Batch;
use std::sync::Arc;

/// Every configured destination for closed windows
pub struct Egress {
    file: Option<DailyJsonlWriter>,
    network: Option<DeliveryQueue>,
}

impl Egress {
    pub fn new(file: Option<DailyJsonlWriter>, network: Option<DeliveryQueue>) -> Self {
        Self { file, network }
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn network_type(&self) -> Option<&'static str> {
        self.network.as_ref().map(|q| q.sink_type())
    }

    /// Write the batch to the day file, then hand it to the network worker.
    /// Errors are logged here and never reach the caller.
    pub fn emit(&mut self, batch: Batch) {
        if let Some(writer) = self.file.as_mut() {
            match writer.write_batch(&batch) {
                Ok(path) => log::debug!(
                    "💾 Appended {} summaries to {}",
                    batch.len(),
                    path.display()
                ),
                Err(e) => log::error!(
                    "❌ Failed to write batch at {} under {}: {}",
                    batch.closing_ts,
                    writer.base_path().display(),
                    e
                ),
            }
        }

        if let Some(queue) = &self.network {
            queue.enqueue(Arc::new(batch));
        }
    }
}
