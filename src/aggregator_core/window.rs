//! Event-time window aggregation over a device population
//!
//! One window is shared by every device. The watermark is the `ts` of the
//! reading that opened the window; the first reading whose `ts` is at least
//! `interval` seconds past it closes the window. The closing reading is
//! accumulated before the flush, so it belongs to the window it closes.

use super::normalizer::{DeviceId, Reading, ReadingError};
use super::reducers::{DispatchTable, ReducedValue};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_INTERVAL_SECS: i64 = 60;

/// One device's reduced values for a closed window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub id: DeviceId,
    pub ts: i64,
    #[serde(flatten)]
    pub fields: BTreeMap<String, ReducedValue>,
}

/// Summaries emitted by one flush, ordered by device id
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub closing_ts: i64,
    pub summaries: Vec<Summary>,
}

impl Batch {
    /// Wire form: a JSON array of summaries
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.summaries)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn summary_for(&self, id: &DeviceId) -> Option<&Summary> {
        self.summaries.iter().find(|s| &s.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    /// No reading parsed yet
    Warming,
    Accumulating,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub readings: u64,
    pub malformed: u64,
    pub flushes: u64,
    pub dropped_reductions: u64,
}

/// Per-field samples for one device, in arrival order
#[derive(Debug, Clone, Default)]
pub struct DeviceSamples {
    fields: HashMap<String, Vec<Value>>,
}

impl DeviceSamples {
    pub fn push(&mut self, field: &str, value: Value) {
        self.fields.entry(field.to_string()).or_default().push(value);
    }

    pub fn samples(&self, field: &str) -> Option<&[Value]> {
        self.fields.get(field).map(|v| v.as_slice())
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

pub struct WindowAggregator {
    interval: i64,
    dispatch: DispatchTable,
    window_start: Option<i64>,
    accumulated: BTreeMap<DeviceId, DeviceSamples>,
    stats: WindowStats,
}

impl WindowAggregator {
    pub fn new(interval: i64) -> Self {
        Self::with_dispatch(interval, DispatchTable::standard())
    }

    pub fn with_dispatch(interval: i64, dispatch: DispatchTable) -> Self {
        Self {
            interval,
            dispatch,
            window_start: None,
            accumulated: BTreeMap::new(),
            stats: WindowStats::default(),
        }
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn phase(&self) -> WindowPhase {
        match self.window_start {
            None => WindowPhase::Warming,
            Some(_) => WindowPhase::Accumulating,
        }
    }

    pub fn window_start(&self) -> Option<i64> {
        self.window_start
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    pub fn device_count(&self) -> usize {
        self.accumulated.len()
    }

    pub fn samples(&self, id: &DeviceId) -> Option<&DeviceSamples> {
        self.accumulated.get(id)
    }

    /// Parse and ingest one raw line.
    ///
    /// A malformed line is counted and returned as an error; it leaves the
    /// watermark and the accumulated samples untouched.
    pub fn ingest_line(&mut self, line: &str) -> Result<Option<Batch>, ReadingError> {
        match Reading::from_jsonl(line) {
            Ok(reading) => Ok(self.ingest(reading)),
            Err(e) => {
                self.stats.malformed += 1;
                Err(e)
            }
        }
    }

    /// Accumulate one reading and flush if it closes the window
    pub fn ingest(&mut self, reading: Reading) -> Option<Batch> {
        let Reading { id, ts, fields } = reading;
        let window_start = *self.window_start.get_or_insert(ts);
        self.stats.readings += 1;

        // The closing reading belongs to the window it closes
        let device = self.accumulated.entry(id).or_default();
        for (field, value) in fields {
            device.push(&field, value);
        }

        // Saturates on extreme timestamps instead of overflowing
        if ts.saturating_sub(window_start) >= self.interval {
            Some(self.flush(ts))
        } else {
            None
        }
    }

    fn flush(&mut self, closing_ts: i64) -> Batch {
        // Every device starts the next window empty
        let accumulated = std::mem::take(&mut self.accumulated);
        self.window_start = Some(closing_ts);
        self.stats.flushes += 1;

        let mut summaries = Vec::with_capacity(accumulated.len());
        for (id, device) in accumulated {
            let mut fields = BTreeMap::new();

            for (field, samples) in &device.fields {
                // Fields without a reducer (id, ts, mac, ...) are not summarized
                let Some(reducer) = self.dispatch.reducer_for(field) else {
                    continue;
                };
                match reducer.apply(samples) {
                    Ok(value) => {
                        fields.insert(field.clone(), value);
                    }
                    Err(e) => {
                        // Only this field is lost; the rest of the summary stands
                        self.stats.dropped_reductions += 1;
                        log::warn!(
                            "⚠️  Dropping {} for device {} ({}): {}",
                            field,
                            id,
                            reducer.as_str(),
                            e
                        );
                    }
                }
            }

            summaries.push(Summary {
                id,
                ts: closing_ts,
                fields,
            });
        }

        log::debug!(
            "Window closed at {}: {} summaries",
            closing_ts,
            summaries.len()
        );

        Batch {
            closing_ts,
            summaries,
        }
    }
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_SECS)
    }
}
