//! Recorded JSONL log reader: replay to EOF, or follow with rotation detection

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use super::read_lossy_line;
use tokio::io::{AsyncSeekExt, BufReader};
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

pub struct LogReader {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    follow: bool,
    poll_interval: Duration,
}

impl LogReader {
    /// `follow = false` replays the file from the start and stops at EOF.
    /// `follow = true` starts at the current end and waits for appended lines.
    pub fn new(path: impl AsRef<Path>, follow: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            inode: None,
            follow,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    pub async fn start(&mut self) -> std::io::Result<()> {
        self.open(self.follow).await?;
        if self.follow {
            log::info!("📖 Started tailing: {}", self.path.display());
        } else {
            log::info!("📖 Replaying: {}", self.path.display());
        }
        Ok(())
    }

    async fn open(&mut self, from_end: bool) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;

        #[cfg(unix)]
        {
            self.inode = Some(file.metadata().await?.ino());
        }

        let mut reader = BufReader::new(file);
        if from_end {
            reader.seek(SeekFrom::End(0)).await?;
        }
        self.file = Some(reader);
        Ok(())
    }

    /// Next non-blank line. `None` at EOF when not following.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        if self.file.is_none() {
            self.start().await?;
        }

        loop {
            if self.follow && self.detect_rotation().await? {
                log::info!("🔄 Log rotation detected, reopening: {}", self.path.display());
                self.open(false).await?;
            }

            let reader = match self.file.as_mut() {
                Some(reader) => reader,
                None => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "File not opened",
                    ))
                }
            };

            let line = match read_lossy_line(reader).await? {
                Some(line) => line,
                None if !self.follow => return Ok(None),
                None => {
                    sleep(self.poll_interval).await;
                    continue;
                }
            };

            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }

    /// Inode changed under the same path
    async fn detect_rotation(&self) -> std::io::Result<bool> {
        #[cfg(unix)]
        {
            match tokio::fs::metadata(&self.path).await {
                Ok(metadata) => Ok(self.inode.is_some_and(|old| old != metadata.ino())),
                // Rotated away and not yet recreated
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        }

        #[cfg(not(unix))]
        {
            Ok(false)
        }
    }
}
