//! Buffered CSV record writer.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::storage::model::MetricRecord;

/// Default number of buffered records that triggers an automatic flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1000;

/// Error type for persistence failures.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error on the output file.
    Io(std::io::Error),
    /// CSV encoding or decoding failed.
    Csv(csv::Error),
    /// A record's column set differs from the file's column set.
    ColumnMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Csv(e) => write!(f, "CSV error: {}", e),
            StorageError::ColumnMismatch { expected, got } => write!(
                f,
                "record columns {:?} do not match buffer columns {:?}",
                got, expected
            ),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<csv::Error> for StorageError {
    fn from(e: csv::Error) -> Self {
        StorageError::Csv(e)
    }
}

/// Accumulates metric records in memory and flushes them to one CSV file in
/// batches.
///
/// Whether a header is still owed is decided exactly once, at construction,
/// by probing the target file: appending to a file left by an earlier run
/// skips the header so the file never carries two. The decision is never
/// re-evaluated per flush.
///
/// All records fed to one buffer must share the first record's column set;
/// a mismatch is rejected instead of writing misaligned rows. There is no
/// rollback on partial I/O failure — a mid-write crash can leave a truncated
/// file, which is acceptable for an operational metrics stream.
pub struct CsvBuffer {
    buffer: Vec<MetricRecord>,
    path: PathBuf,
    threshold: usize,
    header_written: bool,
    /// Column order pinned by the first record ever appended.
    columns: Option<Vec<&'static str>>,
}

impl CsvBuffer {
    /// Creates a buffer bound to `path`, probing the file's existence to
    /// decide header ownership.
    pub fn new(path: impl Into<PathBuf>, threshold: usize) -> Self {
        let path = path.into();
        let header_written = path.exists();
        Self::with_header_written(path, threshold, header_written)
    }

    /// Creates a buffer with an explicit header decision, bypassing the
    /// existence probe.
    pub fn with_header_written(
        path: impl Into<PathBuf>,
        threshold: usize,
        header_written: bool,
    ) -> Self {
        Self {
            buffer: Vec::new(),
            path: path.into(),
            threshold: threshold.max(1),
            header_written,
            columns: None,
        }
    }

    /// Target file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers one record; flushes synchronously when the threshold is
    /// reached.
    pub fn append(&mut self, record: MetricRecord) -> Result<(), StorageError> {
        match &self.columns {
            None => self.columns = Some(record.columns()),
            Some(columns) => {
                let got = record.columns();
                if *columns != got {
                    return Err(StorageError::ColumnMismatch {
                        expected: columns.iter().map(|c| c.to_string()).collect(),
                        got: got.iter().map(|c| c.to_string()).collect(),
                    });
                }
            }
        }

        self.buffer.push(record);
        if self.buffer.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes all pending records to the target file and clears the buffer.
    ///
    /// No-op on an empty buffer. The header is written only if the
    /// construction-time decision says it is still owed.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);

        // A non-empty buffer always has pinned columns, but there is no need
        // to panic on the invariant: without columns no header can be owed.
        if !self.header_written {
            if let Some(columns) = &self.columns {
                writer.write_record(columns.iter())?;
                self.header_written = true;
            }
        }

        let flushed = self.buffer.len();
        for record in self.buffer.drain(..) {
            writer.write_record(record.cells())?;
        }
        writer.flush().map_err(StorageError::Io)?;

        debug!(rows = flushed, path = %self.path.display(), "flushed records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{MetricRecord, MetricValue};
    use tempfile::TempDir;

    fn record(a: i64, b: &str) -> MetricRecord {
        let mut r = MetricRecord::new();
        r.push("count", MetricValue::Int(a));
        r.push("label", MetricValue::Text(b.to_string()));
        r
    }

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[test]
    fn appends_below_threshold_do_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        let mut buffer = CsvBuffer::new(&path, 10);

        buffer.append(record(1, "a")).unwrap();
        buffer.append(record(2, "b")).unwrap();

        assert_eq!(buffer.pending(), 2);
        assert!(!path.exists());
    }

    #[test]
    fn threshold_reached_triggers_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        let mut buffer = CsvBuffer::new(&path, 2);

        buffer.append(record(1, "a")).unwrap();
        assert_eq!(line_count(&path), 0);

        buffer.append(record(2, "b")).unwrap();
        // Header + 2 data rows, buffer drained.
        assert_eq!(line_count(&path), 3);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn flush_on_empty_buffer_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        let mut buffer = CsvBuffer::new(&path, 10);

        buffer.flush().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn explicit_flush_writes_exactly_pending_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        let mut buffer = CsvBuffer::new(&path, 100);

        for i in 0..5 {
            buffer.append(record(i, "x")).unwrap();
        }
        buffer.flush().unwrap();

        assert_eq!(line_count(&path), 6); // header + 5
        assert_eq!(buffer.pending(), 0);

        buffer.append(record(99, "y")).unwrap();
        buffer.flush().unwrap();
        assert_eq!(line_count(&path), 7); // rows only, no second header
    }

    #[test]
    fn header_written_once_across_buffer_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");

        let mut first = CsvBuffer::new(&path, 10);
        first.append(record(1, "a")).unwrap();
        first.flush().unwrap();

        // Second instance pointed at the now-existing file: probe says the
        // header is already there.
        let mut second = CsvBuffer::new(&path, 10);
        second.append(record(2, "b")).unwrap();
        second.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("count,label").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn explicit_header_decision_overrides_probe() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        std::fs::write(&path, "stale junk\n").unwrap();

        let mut buffer = CsvBuffer::with_header_written(&path, 10, false);
        buffer.append(record(1, "a")).unwrap();
        buffer.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("count,label"));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        let mut buffer = CsvBuffer::new(&path, 10);

        buffer.append(record(1, "a")).unwrap();

        let mut other = MetricRecord::new();
        other.push("different", MetricValue::Int(1));
        let err = buffer.append(other).unwrap_err();
        assert!(matches!(err, StorageError::ColumnMismatch { .. }));
        assert_eq!(buffer.pending(), 1);
    }
}
