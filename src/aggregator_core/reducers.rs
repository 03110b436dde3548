//! Field reducers: raw per-window samples -> one summary value
//!
//! Every reducer is a pure function over the samples of one field, in arrival
//! order. The dispatch table binds the known sensor field names to a reducer
//! and is built once per aggregator.

use super::duration::{self, DurationError};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ReduceError {
    Duration(DurationError),
    NonNumeric(String),
    Shape(String),
    Empty,
}

impl From<DurationError> for ReduceError {
    fn from(err: DurationError) -> Self {
        ReduceError::Duration(err)
    }
}

impl std::fmt::Display for ReduceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceError::Duration(e) => write!(f, "Duration error: {}", e),
            ReduceError::NonNumeric(v) => write!(f, "Non-numeric sample: {}", v),
            ReduceError::Shape(msg) => write!(f, "Unexpected sample shape: {}", msg),
            ReduceError::Empty => write!(f, "Reducer invoked with no samples"),
        }
    }
}

impl std::error::Error for ReduceError {}

/// Result of reducing one field over a window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReducedValue {
    /// Mean of numeric samples (NaN serializes as `null`)
    Number(f64),
    /// One of the input samples, unchanged (min/max/latest)
    Raw(Value),
    Vector([f64; 3]),
    Seconds(i64),
    Motion { motion: bool, last_change: i64 },
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reducer {
    Mean,
    Min,
    Max,
    Latest,
    MaxVec3,
    /// Component-wise vector mean. Not bound to any field.
    Mean3,
    Uptime,
    MotionInference,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Latest => "latest",
            Reducer::MaxVec3 => "max_vec3",
            Reducer::Mean3 => "mean3",
            Reducer::Uptime => "uptime",
            Reducer::MotionInference => "motion_inference",
        }
    }

    pub fn apply(&self, samples: &[Value]) -> Result<ReducedValue, ReduceError> {
        match self {
            Reducer::Mean => mean(samples).map(ReducedValue::Number),
            Reducer::Min => min(samples).map(ReducedValue::Raw),
            Reducer::Max => max(samples).map(ReducedValue::Raw),
            Reducer::Latest => Ok(latest(samples).map_or(ReducedValue::None, ReducedValue::Raw)),
            Reducer::MaxVec3 => max_vec3(samples).map(ReducedValue::Vector),
            Reducer::Mean3 => mean3(samples).map(ReducedValue::Vector),
            Reducer::Uptime => uptime(samples).map(ReducedValue::Seconds),
            Reducer::MotionInference => motion_inference(samples).map(|m| ReducedValue::Motion {
                motion: m.motion,
                last_change: m.last_change,
            }),
        }
    }
}

const STANDARD_FIELDS: [(&str, Reducer); 14] = [
    ("temperature", Reducer::Mean),
    ("light_level", Reducer::Mean),
    ("pressure", Reducer::Mean),
    ("humidity", Reducer::Mean),
    ("battery_level", Reducer::Min),
    ("battery_voltage", Reducer::Min),
    ("in_motion", Reducer::Max),
    ("motion", Reducer::Max),
    ("movement_counter", Reducer::Latest),
    ("motion_count", Reducer::Latest),
    ("seconds_since", Reducer::Latest),
    ("accelerometer", Reducer::MaxVec3),
    ("uptime", Reducer::Uptime),
    ("motion_duration", Reducer::MotionInference),
];

/// Field name -> reducer bindings
#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: HashMap<&'static str, Reducer>,
}

impl DispatchTable {
    pub fn standard() -> Self {
        Self {
            entries: STANDARD_FIELDS.iter().copied().collect(),
        }
    }

    pub fn reducer_for(&self, field: &str) -> Option<Reducer> {
        self.entries.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSummary {
    pub motion: bool,
    pub last_change: i64,
}

/// Booleans count as 0/1
fn numeric(value: &Value) -> Result<f64, ReduceError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ReduceError::NonNumeric(value.to_string())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        _ => Err(ReduceError::NonNumeric(value.to_string())),
    }
}

fn vec3(value: &Value) -> Result<[f64; 3], ReduceError> {
    match value.as_array().map(|a| a.as_slice()) {
        Some([x, y, z]) => Ok([numeric(x)?, numeric(y)?, numeric(z)?]),
        _ => Err(ReduceError::Shape(format!("expected 3-element vector, got {}", value))),
    }
}

fn duration_text(value: &Value) -> Result<&str, ReduceError> {
    value
        .as_str()
        .ok_or_else(|| ReduceError::Shape(format!("expected duration string, got {}", value)))
}

pub fn mean(samples: &[Value]) -> Result<f64, ReduceError> {
    if samples.is_empty() {
        return Ok(f64::NAN);
    }
    let mut sum = 0.0;
    for sample in samples {
        sum += numeric(sample)?;
    }
    Ok(sum / samples.len() as f64)
}

/// Left-to-right scan keeping the first sample for which no later one is `better`
fn select_extreme(
    samples: &[Value],
    better: fn(f64, f64) -> bool,
) -> Result<Value, ReduceError> {
    let (first, rest) = samples.split_first().ok_or(ReduceError::Empty)?;
    let mut best = first;
    let mut best_key = numeric(first)?;

    for sample in rest {
        let key = numeric(sample)?;
        if better(key, best_key) {
            best = sample;
            best_key = key;
        }
    }

    Ok(best.clone())
}

pub fn min(samples: &[Value]) -> Result<Value, ReduceError> {
    select_extreme(samples, |candidate, best| candidate < best)
}

pub fn max(samples: &[Value]) -> Result<Value, ReduceError> {
    select_extreme(samples, |candidate, best| candidate > best)
}

pub fn latest(samples: &[Value]) -> Option<Value> {
    samples.last().cloned()
}

/// Vector with the largest squared magnitude; the earliest wins ties
pub fn max_vec3(samples: &[Value]) -> Result<[f64; 3], ReduceError> {
    let mut best = [f64::NAN; 3];
    let mut best_norm = f64::NEG_INFINITY;

    for sample in samples {
        let v = vec3(sample)?;
        let norm = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
        if norm > best_norm {
            best = v;
            best_norm = norm;
        }
    }

    Ok(best)
}

pub fn mean3(samples: &[Value]) -> Result<[f64; 3], ReduceError> {
    if samples.is_empty() {
        return Ok([f64::NAN; 3]);
    }
    let mut sum = [0.0; 3];
    for sample in samples {
        let v = vec3(sample)?;
        for i in 0..3 {
            sum[i] += v[i];
        }
    }
    let n = samples.len() as f64;
    Ok([sum[0] / n, sum[1] / n, sum[2] / n])
}

/// Smallest decoded uptime, in seconds
pub fn uptime(samples: &[Value]) -> Result<i64, ReduceError> {
    let mut smallest: Option<i64> = None;
    for sample in samples {
        let secs = duration::decode(duration_text(sample)?)?;
        smallest = Some(smallest.map_or(secs, |s| s.min(secs)));
    }
    smallest.ok_or(ReduceError::Empty)
}

/// Infer motion from `{current, previous}` "time since last state change" samples.
///
/// Motion is reported when some `current` in the window is smaller than the
/// first one, i.e. the counter restarted mid-window. `previous` is decoded
/// (so a malformed value still fails the reduction) but does not influence
/// the result.
pub fn motion_inference(samples: &[Value]) -> Result<MotionSummary, ReduceError> {
    let mut current = Vec::with_capacity(samples.len());

    for sample in samples {
        let record = sample
            .as_object()
            .ok_or_else(|| ReduceError::Shape(format!("expected motion record, got {}", sample)))?;
        let field = |name: &str| {
            record
                .get(name)
                .ok_or_else(|| ReduceError::Shape(format!("motion record missing '{}'", name)))
                .and_then(duration_text)
        };

        current.push(duration::decode(field("current")?)?);
        let _previous = duration::decode(field("previous")?)?;
    }

    let first = *current.first().ok_or(ReduceError::Empty)?;
    let minima = current.iter().copied().min().unwrap_or(first);

    Ok(MotionSummary {
        motion: minima != first,
        last_change: minima,
    })
}
