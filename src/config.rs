//! Recorder configuration from environment variables and command-line flags
//!
//! Environment variables (a `.env` file is honored by the binary):
//! - `RECORDER_INTERVAL` - window length, seconds or a duration like `5m` (default: 60)
//! - `RECORDER_DATA_DIR` - day-file directory (default: data, empty disables)
//! - `RECORDER_POST_URL` - HTTP endpoint receiving each batch (optional)
//! - `RECORDER_MQTT_BROKER` - `host[:port]` of an MQTT broker (optional)
//! - `RECORDER_MQTT_TOPIC` - topic for batches, required with a broker
//! - `RECORDER_MQTT_CLIENT_ID` - MQTT client id (default: sensorflow-recorder)
//! - `RECORDER_SOURCE` - bridge | stdin | file (default: bridge)
//! - `RECORDER_INPUT` - recorded JSONL file for the file source
//! - `RECORDER_BRIDGE_BIN` - sensor bridge executable (default: ./recv-sensors)
//! - `RECORDER_BRIDGE_DEVICE` - radio interface passed to the bridge (default: hci0)
//!
//! Flags override the environment: `--source`, `--input`, `--follow`,
//! `--interval`, `--data-dir`, `--no-file`, `--device`.

use crate::aggregator_core::{duration, DEFAULT_INTERVAL_SECS};
use crate::sink_core::mqtt_publisher::DEFAULT_MQTT_PORT;
use std::env;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BRIDGE_BIN: &str = "./recv-sensors";
const DEFAULT_BRIDGE_DEVICE: &str = "hci0";
const DEFAULT_MQTT_CLIENT_ID: &str = "sensorflow-recorder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Bridge,
    Stdin,
    File,
}

impl SourceKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bridge" => Some(SourceKind::Bridge),
            "stdin" => Some(SourceKind::Stdin),
            "file" => Some(SourceKind::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkTarget {
    Http {
        url: String,
    },
    Mqtt {
        host: String,
        port: u16,
        topic: String,
        client_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub interval_secs: i64,
    pub data_dir: Option<PathBuf>,
    pub network: Option<NetworkTarget>,
    pub source: SourceKind,
    pub input_path: Option<PathBuf>,
    pub follow: bool,
    pub bridge_bin: String,
    pub bridge_device: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing configuration: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|x| x == name)
        .and_then(|idx| args.get(idx + 1))
        .map(|s| s.as_str())
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|x| x == name)
}

/// Plain seconds (`"90"`) or a duration string (`"5m"`)
pub fn parse_interval(text: &str) -> Result<i64, ConfigError> {
    let text = text.trim();
    let secs = match text.parse::<i64>() {
        Ok(secs) => secs,
        Err(_) => duration::decode(text)
            .map_err(|e| ConfigError::InvalidValue(format!("interval '{}': {}", text, e)))?,
    };

    if secs <= 0 {
        return Err(ConfigError::InvalidValue(format!(
            "interval must be positive, got {}",
            text
        )));
    }
    Ok(secs)
}

fn parse_broker(broker: &str) -> Result<(String, u16), ConfigError> {
    match broker.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                ConfigError::InvalidValue(format!("RECORDER_MQTT_BROKER port in '{}'", broker))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((broker.to_string(), DEFAULT_MQTT_PORT)),
    }
}

impl RecorderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::from_sources(&args, |key| env::var(key).ok())
    }

    /// Build from flags plus a variable lookup (`std::env::var` in production)
    pub fn from_sources<F>(args: &[String], lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty variables count as unset
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let interval_flag = flag_value(args, "--interval").map(str::to_string);
        let interval_secs = match interval_flag.or_else(|| var("RECORDER_INTERVAL")) {
            Some(text) => parse_interval(&text)?,
            None => DEFAULT_INTERVAL_SECS,
        };

        let data_dir = if has_flag(args, "--no-file") {
            None
        } else if let Some(dir) = flag_value(args, "--data-dir") {
            Some(PathBuf::from(dir))
        } else {
            match lookup("RECORDER_DATA_DIR") {
                Some(dir) if dir.trim().is_empty() => None,
                Some(dir) => Some(PathBuf::from(dir)),
                None => Some(PathBuf::from(DEFAULT_DATA_DIR)),
            }
        };

        let input_path = flag_value(args, "--input")
            .map(PathBuf::from)
            .or_else(|| var("RECORDER_INPUT").map(PathBuf::from));

        let source_flag = flag_value(args, "--source").map(str::to_string);
        let source = match source_flag.or_else(|| var("RECORDER_SOURCE")) {
            Some(name) => SourceKind::from_str(&name).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "source must be bridge, stdin or file, got '{}'",
                    name
                ))
            })?,
            None if input_path.is_some() => SourceKind::File,
            None => SourceKind::Bridge,
        };

        if source == SourceKind::File && input_path.is_none() {
            return Err(ConfigError::MissingVariable(
                "--input or RECORDER_INPUT for the file source".to_string(),
            ));
        }

        let network = Self::network_from(&var)?;

        Ok(Self {
            interval_secs,
            data_dir,
            network,
            source,
            input_path,
            follow: has_flag(args, "--follow"),
            bridge_bin: var("RECORDER_BRIDGE_BIN").unwrap_or_else(|| DEFAULT_BRIDGE_BIN.to_string()),
            bridge_device: flag_value(args, "--device")
                .map(str::to_string)
                .or_else(|| var("RECORDER_BRIDGE_DEVICE"))
                .unwrap_or_else(|| DEFAULT_BRIDGE_DEVICE.to_string()),
        })
    }

    fn network_from<F>(var: &F) -> Result<Option<NetworkTarget>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let post_url = var("RECORDER_POST_URL");
        let broker = var("RECORDER_MQTT_BROKER");

        match (post_url, broker) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidValue(
                "set only one of RECORDER_POST_URL and RECORDER_MQTT_BROKER".to_string(),
            )),
            (Some(url), None) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::InvalidValue(
                        "RECORDER_POST_URL must start with http:// or https://".to_string(),
                    ));
                }
                Ok(Some(NetworkTarget::Http { url }))
            }
            (None, Some(broker)) => {
                let topic = var("RECORDER_MQTT_TOPIC")
                    .ok_or_else(|| ConfigError::MissingVariable("RECORDER_MQTT_TOPIC".to_string()))?;
                let (host, port) = parse_broker(&broker)?;
                Ok(Some(NetworkTarget::Mqtt {
                    host,
                    port,
                    topic,
                    client_id: var("RECORDER_MQTT_CLIENT_ID")
                        .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
                }))
            }
            (None, None) => Ok(None),
        }
    }
}
