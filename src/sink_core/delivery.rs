//! Fire-and-forget delivery of batches to a network sink
//!
//! The ingestion loop pushes batches onto an unbounded channel and never
//! waits. A worker drains the channel and spawns one detached task per batch,
//! so a slow delivery never holds back the next one and completion order is
//! not guaranteed. Failures are logged and dropped; nothing is retried.

use super::writer_backend::BatchSink;
use crate::aggregator_core::Batch;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Arc<Batch>>,
    sink_type: &'static str,
}

impl DeliveryQueue {
    /// Hand a batch to the worker. Returns false if the worker has stopped.
    pub fn enqueue(&self, batch: Arc<Batch>) -> bool {
        match self.tx.send(batch) {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "❌ {} delivery worker stopped, dropping batch at {}",
                    self.sink_type,
                    e.0.closing_ts
                );
                false
            }
        }
    }

    pub fn sink_type(&self) -> &'static str {
        self.sink_type
    }
}

/// Start the delivery worker for `sink`.
///
/// The worker ends when every [`DeliveryQueue`] clone is dropped. Tasks it
/// already spawned keep running on their own.
pub fn spawn_delivery_worker(sink: Arc<dyn BatchSink>) -> (DeliveryQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Batch>>();
    let sink_type = sink.sink_type();

    let handle = tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            let sink = sink.clone();
            tokio::spawn(async move {
                match sink.deliver(&batch).await {
                    Ok(()) => log::debug!(
                        "✅ {} delivered batch at {} ({} summaries)",
                        sink.sink_type(),
                        batch.closing_ts,
                        batch.len()
                    ),
                    Err(e) => log::error!(
                        "❌ {} delivery of batch at {} failed: {}",
                        sink.sink_type(),
                        batch.closing_ts,
                        e
                    ),
                }
            });
        }
        log::debug!("{} delivery worker stopped", sink_type);
    });

    (DeliveryQueue { tx, sink_type }, handle)
}
