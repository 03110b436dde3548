//! Streamer Core - Reading Ingress
//!
//! Every source yields raw text lines; parsing happens in the aggregator.

pub mod bridge;
pub mod reader;

pub use bridge::SensorBridge;
pub use reader::LogReader;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Debug)]
pub enum IngressError {
    Spawn {
        program: String,
        source: std::io::Error,
    },
    MissingStdout,
    Io(std::io::Error),
}

impl From<std::io::Error> for IngressError {
    fn from(err: std::io::Error) -> Self {
        IngressError::Io(err)
    }
}

impl std::fmt::Display for IngressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngressError::Spawn { program, source } => {
                write!(f, "Failed to start sensor bridge '{}': {}", program, source)
            }
            IngressError::MissingStdout => write!(f, "Sensor bridge stdout not captured"),
            IngressError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for IngressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngressError::Spawn { source, .. } => Some(source),
            IngressError::Io(e) => Some(e),
            IngressError::MissingStdout => None,
        }
    }
}

/// Read one raw line. Bytes that are not valid UTF-8 are replaced rather
/// than failing the read, so a corrupt line reaches the parser as malformed.
/// `None` at EOF.
pub(crate) async fn read_lossy_line<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

pub enum LineSource {
    Bridge(SensorBridge),
    Log(LogReader),
    Stream(Box<dyn AsyncBufRead + Unpin + Send>),
}

impl LineSource {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        LineSource::Stream(Box::new(reader))
    }

    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    pub fn describe(&self) -> String {
        match self {
            LineSource::Bridge(bridge) => format!("bridge {}", bridge.program()),
            LineSource::Log(reader) if reader.is_following() => {
                format!("tail {}", reader.path().display())
            }
            LineSource::Log(reader) => format!("replay {}", reader.path().display()),
            LineSource::Stream(_) => "stream".to_string(),
        }
    }

    /// Next non-blank line, trimmed. `None` when the source is exhausted.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let line = match self {
                LineSource::Bridge(bridge) => bridge.next_line().await?,
                LineSource::Log(reader) => return reader.read_line().await,
                LineSource::Stream(reader) => read_lossy_line(reader).await?,
            };

            match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(line.trim().to_string())),
                None => return Ok(None),
            }
        }
    }

    /// Release the source; terminates the bridge process if there is one
    pub async fn shutdown(&mut self) {
        if let LineSource::Bridge(bridge) = self {
            bridge.terminate().await;
        }
    }
}
