//! Sensor reading normalization from JSONL lines

use serde::Serialize;
use serde_json::{Map, Value};

/// Device identifier as emitted by the sensor bridge: a string or an integer.
///
/// Integers above `i64::MAX` land in `Unsigned`, so numeric ids still sort in
/// numeric order. Fractional ids (and fractional `ts`) are rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum DeviceId {
    Number(i64),
    Unsigned(u64),
    Text(String),
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceId::Number(n) => write!(f, "{}", n),
            DeviceId::Unsigned(n) => write!(f, "{}", n),
            DeviceId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::Text(s.to_string())
    }
}

impl From<i64> for DeviceId {
    fn from(n: i64) -> Self {
        DeviceId::Number(n)
    }
}

/// Why a line was rejected as a malformed record
#[derive(Debug)]
pub enum ReadingError {
    Json(serde_json::Error),
    NotAnObject,
    MissingField(&'static str),
    InvalidField { field: &'static str, value: String },
}

impl From<serde_json::Error> for ReadingError {
    fn from(err: serde_json::Error) -> Self {
        ReadingError::Json(err)
    }
}

impl std::fmt::Display for ReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingError::Json(e) => write!(f, "Malformed record: {}", e),
            ReadingError::NotAnObject => write!(f, "Malformed record: not a JSON object"),
            ReadingError::MissingField(field) => write!(f, "Malformed record: missing '{}'", field),
            ReadingError::InvalidField { field, value } => {
                write!(f, "Malformed record: invalid '{}' value {}", field, value)
            }
        }
    }
}

impl std::error::Error for ReadingError {}

/// One sensor sample. `fields` holds every key of the line, `id` and `ts` included.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: DeviceId,
    pub ts: i64,
    pub fields: Map<String, Value>,
}

impl Reading {
    /// Parse a Reading from a JSONL line
    pub fn from_jsonl(line: &str) -> Result<Self, ReadingError> {
        let value: Value = serde_json::from_str(line)?;
        let fields = match value {
            Value::Object(fields) => fields,
            _ => return Err(ReadingError::NotAnObject),
        };

        let id = match fields.get("id") {
            None => return Err(ReadingError::MissingField("id")),
            Some(Value::String(s)) => DeviceId::Text(s.clone()),
            Some(other) => other
                .as_i64()
                .map(DeviceId::Number)
                .or_else(|| other.as_u64().map(DeviceId::Unsigned))
                .ok_or_else(|| ReadingError::InvalidField {
                    field: "id",
                    value: other.to_string(),
                })?,
        };

        let ts = match fields.get("ts") {
            None => return Err(ReadingError::MissingField("ts")),
            Some(value) => value.as_i64().ok_or_else(|| ReadingError::InvalidField {
                field: "ts",
                value: value.to_string(),
            })?,
        };

        Ok(Self { id, ts, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nearable_jsonl() {
        let line = r#"{ "ts": 1469829123, "mac": "d0d3fa86ca76", "id": "1a2b3c4d5e6f7a8b", "accelerometer": [0.016, -0.031, 1.000], "in_motion": false, "motion_duration": { "previous": "12s", "current": "3m" }, "pressure": 1006.25 }"#;

        let reading = Reading::from_jsonl(line).unwrap();
        assert_eq!(reading.id, DeviceId::from("1a2b3c4d5e6f7a8b"));
        assert_eq!(reading.ts, 1469829123);
        assert_eq!(reading.fields.len(), 7);
        assert!(reading.fields.contains_key("id"));
        assert!(reading.fields.contains_key("ts"));
        assert_eq!(reading.fields["in_motion"], Value::Bool(false));
    }

    #[test]
    fn test_parse_integer_id() {
        let reading = Reading::from_jsonl(r#"{"id": 7, "ts": 100, "temperature": 21.5}"#).unwrap();
        assert_eq!(reading.id, DeviceId::Number(7));
        assert_eq!(reading.id.to_string(), "7");
    }

    #[test]
    fn test_parse_id_above_i64_range() {
        let reading = Reading::from_jsonl(r#"{"id": 18446744073709551615, "ts": 1}"#).unwrap();
        assert_eq!(reading.id, DeviceId::Unsigned(u64::MAX));
        assert_eq!(reading.id.to_string(), "18446744073709551615");
        assert!(DeviceId::Number(i64::MAX) < reading.id);
    }

    #[test]
    fn test_fractional_id_and_ts_rejected() {
        assert!(matches!(
            Reading::from_jsonl(r#"{"id": 1.5, "ts": 1}"#),
            Err(ReadingError::InvalidField { field: "id", .. })
        ));
        assert!(matches!(
            Reading::from_jsonl(r#"{"id": "a", "ts": 10.5}"#),
            Err(ReadingError::InvalidField { field: "ts", .. })
        ));
    }

    #[test]
    fn test_malformed_jsonl() {
        assert!(matches!(Reading::from_jsonl(r#"{"id": "a", "ts"#), Err(ReadingError::Json(_))));
        assert!(matches!(Reading::from_jsonl("[1, 2]"), Err(ReadingError::NotAnObject)));
        assert!(matches!(
            Reading::from_jsonl(r#"{"ts": 10}"#),
            Err(ReadingError::MissingField("id"))
        ));
        assert!(matches!(
            Reading::from_jsonl(r#"{"id": "a"}"#),
            Err(ReadingError::MissingField("ts"))
        ));
        assert!(matches!(
            Reading::from_jsonl(r#"{"id": "a", "ts": "noon"}"#),
            Err(ReadingError::InvalidField { field: "ts", .. })
        ));
        assert!(matches!(
            Reading::from_jsonl(r#"{"id": [1], "ts": 3}"#),
            Err(ReadingError::InvalidField { field: "id", .. })
        ));
    }
}
