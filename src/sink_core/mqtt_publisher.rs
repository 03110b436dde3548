//! MQTT publish sink - each batch is published to one topic at QoS 0

use super::writer_backend::{BatchSink, SinkError};
use crate::aggregator_core::Batch;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Depth of the client request queue shared with the event loop
const REQUEST_CAPACITY: usize = 64;

pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    event_loop: JoinHandle<()>,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop. Connection happens in the
    /// background; connection errors are logged and retried by the loop.
    pub fn connect(host: &str, port: u16, client_id: &str, topic: impl Into<String>) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let broker = format!("{}:{}", host, port);

        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        log::info!("📡 Connected to MQTT broker {}", broker);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("⚠️  MQTT connection to {} failed: {}", broker, e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        Self {
            client,
            topic: topic.into(),
            event_loop,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[async_trait]
impl BatchSink for MqttPublisher {
    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError> {
        let payload = batch.to_json()?;
        self.client
            .publish(self.topic.clone(), QoS::AtMostOnce, false, payload.into_bytes())
            .await?;
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "MQTT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_is_queued_without_broker() {
        // Nothing listens on this port; QoS 0 publishes are still accepted
        let publisher = MqttPublisher::connect("127.0.0.1", 9, "sensorflow-test", "sensors/summary");
        let batch = Batch {
            closing_ts: 120,
            summaries: Vec::new(),
        };

        assert_eq!(publisher.topic(), "sensors/summary");
        assert!(publisher.deliver(&batch).await.is_ok());
    }
}
