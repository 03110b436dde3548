//! End-to-end tests: recorded JSONL → WindowAggregator → day files + network sink
//!
//! The network sink is replaced by a capturing BatchSink fed through the real
//! fire-and-forget delivery queue.

use async_trait::async_trait;
use sensorflow::aggregator_core::{Batch, WindowAggregator};
use sensorflow::runtime::{run_recorder, StopReason};
use sensorflow::sink_core::{spawn_delivery_worker, BatchSink, DailyJsonlWriter, Egress, SinkError};
use sensorflow::streamer_core::{LineSource, LogReader};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct CaptureSink {
    tx: mpsc::UnboundedSender<Batch>,
}

#[async_trait]
impl BatchSink for CaptureSink {
    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError> {
        let _ = self.tx.send(batch.clone());
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "Capture"
    }
}

const RECORDED: &str = r#"{"ts": 1469829000, "id": "n1", "temperature": 21.0, "battery_level": 90, "uptime": "3d"}
{"ts": 1469829010, "id": "s1", "accelerometer": [0.0, 0.0, 1.0], "in_motion": false, "motion_duration": {"previous": "1m", "current": "30s"}}
not json at all
{"ts": 1469829030, "id": "n1", "temperature": 23.0, "battery_level": 89, "uptime": "3d"}

{"ts": 1469829045, "id": "s1", "accelerometer": [0.5, 0.5, 1.0], "in_motion": true, "motion_duration": {"previous": "30s", "current": "5s"}}
{"ts": 1469829061, "id": "n1", "temperature": 22.0, "battery_level": 89, "uptime": "3d"}
{"ts": 1469829090, "id": "s1", "accelerometer": [0.0, 0.1, 1.0], "in_motion": false, "motion_duration": {"previous": "5s", "current": "50s"}}
{"ts": 1469829125, "id": "s1", "accelerometer": [0.0, 0.0, 0.9], "in_motion": false, "motion_duration": {"previous": "5s", "current": "85s"}}
{"ts": 1469829130, "id": "n1", "temperature": 30.0}
"#;

fn summaries_json(batch: &Batch) -> Value {
    serde_json::from_str(&batch.to_json().unwrap()).unwrap()
}

fn expected_first_window() -> Value {
    json!([
        {
            "id": "n1",
            "ts": 1469829061,
            "temperature": 22.0,
            "battery_level": 89,
            "uptime": 259200
        },
        {
            "id": "s1",
            "ts": 1469829061,
            "accelerometer": [0.5, 0.5, 1.0],
            "in_motion": true,
            "motion_duration": { "motion": true, "last_change": 5 }
        }
    ])
}

fn expected_second_window() -> Value {
    json!([
        {
            "id": "s1",
            "ts": 1469829125,
            "accelerometer": [0.0, 0.1, 1.0],
            "in_motion": false,
            "motion_duration": { "motion": false, "last_change": 50 }
        }
    ])
}

#[tokio::test]
async fn test_replay_writes_day_file_and_delivers_batches() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("capture.jsonl");
    std::fs::write(&input, RECORDED).unwrap();
    let data_dir = temp_dir.path().join("data");

    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();
    let (queue, _worker) = spawn_delivery_worker(Arc::new(CaptureSink { tx: capture_tx }));
    let egress = Egress::new(Some(DailyJsonlWriter::new(&data_dir).unwrap()), Some(queue));

    let mut reader = LogReader::new(&input, false);
    reader.start().await.unwrap();

    let summary = run_recorder(
        LineSource::Log(reader),
        WindowAggregator::new(60),
        egress,
        std::future::pending::<()>(),
    )
    .await;

    assert_eq!(summary.reason, StopReason::IngressClosed);
    assert_eq!(summary.lines, 9);
    assert_eq!(summary.stats.malformed, 1);
    assert_eq!(summary.stats.flushes, 2);
    assert_eq!(summary.discarded_devices, 1);

    // Day file: one line per window, in flush order
    let day_file = std::fs::read_to_string(data_dir.join("20160729.json")).unwrap();
    let lines: Vec<Value> = day_file
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines, vec![expected_first_window(), expected_second_window()]);

    // Network deliveries carry no ordering guarantee
    let mut delivered = Vec::new();
    for _ in 0..2 {
        let batch = tokio::time::timeout(Duration::from_secs(2), capture_rx.recv())
            .await
            .unwrap()
            .unwrap();
        delivered.push(batch);
    }
    delivered.sort_by_key(|b| b.closing_ts);
    assert_eq!(delivered[0].closing_ts, 1469829061);
    assert_eq!(summaries_json(&delivered[0]), expected_first_window());
    assert_eq!(delivered[1].closing_ts, 1469829125);
    assert_eq!(summaries_json(&delivered[1]), expected_second_window());
}

#[tokio::test]
async fn test_first_flush_on_reading_past_interval() {
    let input = [0, 10, 30, 59, 61, 100, 121]
        .iter()
        .map(|ts| json!({ "id": "n1", "ts": ts, "battery_voltage": 3000 - ts }).to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let temp_dir = tempfile::tempdir().unwrap();
    let egress = Egress::new(Some(DailyJsonlWriter::new(temp_dir.path()).unwrap()), None);

    let summary = run_recorder(
        LineSource::from_reader(std::io::Cursor::new(input.into_bytes())),
        WindowAggregator::new(60),
        egress,
        std::future::pending::<()>(),
    )
    .await;
    assert_eq!(summary.stats.flushes, 2);

    let content = std::fs::read_to_string(temp_dir.path().join("19700101.json")).unwrap();
    let batches: Vec<Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(
        batches,
        vec![
            json!([{ "id": "n1", "ts": 61, "battery_voltage": 2939 }]),
            json!([{ "id": "n1", "ts": 121, "battery_voltage": 2879 }]),
        ]
    );
}

#[tokio::test]
async fn test_malformed_lines_do_not_move_watermark() {
    let mut clean = WindowAggregator::new(60);
    let mut noisy = WindowAggregator::new(60);

    let valid = [
        r#"{"id": "n1", "ts": 100, "temperature": 20.0}"#,
        r#"{"id": "n1", "ts": 150, "temperature": 24.0}"#,
    ];

    for line in valid {
        assert!(clean.ingest_line(line).unwrap().is_none());
    }

    noisy.ingest_line(valid[0]).unwrap();
    assert!(noisy.ingest_line(r#"{"id": "n1", "ts": 999, "temperature"#).is_err());
    assert!(noisy.ingest_line(r#"{"ts": 999, "temperature": 1.0}"#).is_err());
    noisy.ingest_line(valid[1]).unwrap();

    assert_eq!(noisy.window_start(), clean.window_start());
    assert_eq!(noisy.device_count(), clean.device_count());

    let closing = r#"{"id": "n1", "ts": 160, "temperature": 22.0}"#;
    let a = clean.ingest_line(closing).unwrap().unwrap();
    let b = noisy.ingest_line(closing).unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(summaries_json(&a), json!([{ "id": "n1", "ts": 160, "temperature": 22.0 }]));
}
