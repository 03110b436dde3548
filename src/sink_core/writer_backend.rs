//! Sink trait for delivering closed-window batches
//!
//! Network sinks implement [`BatchSink`] and are driven by detached delivery
//! tasks, so they take `&self` and must be shareable across tasks.

use crate::aggregator_core::Batch;
use async_trait::async_trait;

#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Http(String),
    Mqtt(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err)
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Http(err.to_string())
    }
}

impl From<rumqttc::ClientError> for SinkError {
    fn from(err: rumqttc::ClientError) -> Self {
        SinkError::Mqtt(err.to_string())
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {}", e),
            SinkError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SinkError::Http(e) => write!(f, "HTTP error: {}", e),
            SinkError::Mqtt(e) => write!(f, "MQTT error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Deliver one batch. Called at most once per batch, never retried.
    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError>;

    /// Get sink type for logging
    fn sink_type(&self) -> &'static str;
}
