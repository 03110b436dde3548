//! Day-partitioned JSONL writer - one `YYYYMMDD.json` file per UTC day

use super::writer_backend::SinkError;
use crate::aggregator_core::Batch;
use chrono::DateTime;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct DailyJsonlWriter {
    base_path: PathBuf,
    current_day: Option<String>,
    file: Option<BufWriter<File>>,
}

impl DailyJsonlWriter {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            current_day: None,
            file: None,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File name for the UTC calendar day containing `ts`
    pub fn day_file_name(ts: i64) -> Result<String, SinkError> {
        let day = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
            SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("timestamp {} out of range", ts),
            ))
        })?;
        Ok(day.format("%Y%m%d.json").to_string())
    }

    /// Append the batch as one JSON line to its day file. Returns the file written.
    pub fn write_batch(&mut self, batch: &Batch) -> Result<PathBuf, SinkError> {
        let day_file = Self::day_file_name(batch.closing_ts)?;
        let path = self.base_path.join(&day_file);

        if self.current_day.as_deref() != Some(day_file.as_str()) || self.file.is_none() {
            self.flush()?;
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            log::info!("📝 Writing summaries to: {}", path.display());
            self.file = Some(BufWriter::new(file));
            self.current_day = Some(day_file);
        }

        let json = batch.to_json()?;
        if let Some(writer) = self.file.as_mut() {
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }

        Ok(path)
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.file.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for DailyJsonlWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator_core::{DeviceId, ReducedValue, Summary};
    use std::collections::BTreeMap;

    fn batch(closing_ts: i64) -> Batch {
        let mut fields = BTreeMap::new();
        fields.insert("temperature".to_string(), ReducedValue::Number(21.5));
        Batch {
            closing_ts,
            summaries: vec![Summary {
                id: DeviceId::from("n1"),
                ts: closing_ts,
                fields,
            }],
        }
    }

    #[test]
    fn test_day_file_name() {
        assert_eq!(DailyJsonlWriter::day_file_name(0).unwrap(), "19700101.json");
        assert_eq!(DailyJsonlWriter::day_file_name(1469829123).unwrap(), "20160729.json");
    }

    #[test]
    fn test_appends_per_day() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut writer = DailyJsonlWriter::new(temp_dir.path()).unwrap();

        let day1 = writer.write_batch(&batch(1469829123)).unwrap();
        writer.write_batch(&batch(1469829183)).unwrap();
        let day2 = writer.write_batch(&batch(1469829123 + 86400)).unwrap();

        assert!(day1.ends_with("20160729.json"));
        assert!(day2.ends_with("20160730.json"));

        let content = std::fs::read_to_string(&day1).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"[{"id":"n1","ts":1469829123,"temperature":21.5}]"#);

        assert_eq!(std::fs::read_to_string(&day2).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_reopens_existing_day_file_in_append_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let mut writer = DailyJsonlWriter::new(temp_dir.path()).unwrap();
            writer.write_batch(&batch(100)).unwrap();
        }
        let mut writer = DailyJsonlWriter::new(temp_dir.path()).unwrap();
        let path = writer.write_batch(&batch(200)).unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("data").join("nearables");
        let writer = DailyJsonlWriter::new(&nested).unwrap();
        assert!(writer.base_path().is_dir());
    }
}
