//! Sensor bridge subprocess - the radio receiver that prints one JSON reading per line

use super::{read_lossy_line, IngressError};
use std::process::Stdio;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};

pub struct SensorBridge {
    program: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
}

impl SensorBridge {
    /// Spawn `program <device>` with stdout piped and stderr inherited
    pub fn spawn(program: &str, device: &str) -> Result<Self, IngressError> {
        let mut child = Command::new(program)
            .arg(device)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| IngressError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(IngressError::MissingStdout)?;

        log::info!(
            "🛰️  Started sensor bridge: {} {} (pid {})",
            program,
            device,
            child.id().map_or_else(|| "?".to_string(), |id| id.to_string())
        );

        Ok(Self {
            program: program.to_string(),
            child,
            stdout: BufReader::new(stdout),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Next stdout line without its terminator, `None` once the bridge closes its stdout
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let line = read_lossy_line(&mut self.stdout).await?;
        Ok(line.map(|l| l.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Stop the bridge if it is still running and reap it
    pub async fn terminate(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::info!("🛰️  Sensor bridge already exited ({})", status);
                return;
            }
            Ok(None) => {}
            Err(e) => log::warn!("⚠️  Failed to poll sensor bridge: {}", e),
        }

        if let Err(e) = self.child.start_kill() {
            log::warn!("⚠️  Failed to stop sensor bridge {}: {}", self.program, e);
        }

        match self.child.wait().await {
            Ok(status) => log::info!("🛰️  Sensor bridge stopped ({})", status),
            Err(e) => log::error!("❌ Failed to reap sensor bridge: {}", e),
        }
    }
}
