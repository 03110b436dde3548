//! Aggregator Core - Windowed Sensor Summaries
//!
//! Turns a stream of raw sensor readings into one summary per device per
//! event-time window.
//!
//! # Architecture
//!
//! ```text
//! JSONL line → Reading::from_jsonl (normalizer)
//!     ↓
//! WindowAggregator (device → field → samples, event-time watermark)
//!     ↓  window closed
//! DispatchTable → Reducer (mean, min, max, latest, max_vec3, uptime, motion_inference)
//!     ↓
//! Batch of Summary records → sink_core
//! ```

pub mod duration;
pub mod normalizer;
pub mod reducers;
pub mod window;

pub use duration::{decode, DurationError};
pub use normalizer::{DeviceId, Reading, ReadingError};
pub use reducers::{DispatchTable, ReduceError, ReducedValue, Reducer};
pub use window::{Batch, Summary, WindowAggregator, WindowPhase, WindowStats, DEFAULT_INTERVAL_SECS};
