//! Post-run summarization pass over the persisted CSV table.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::storage::csv_buffer::StorageError;

/// What the summarization pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// One aggregate row was appended.
    Appended,
    /// A previous pass already summarized this file; nothing was written.
    AlreadySummarized,
    /// The target file does not exist; nothing was written.
    MissingFile,
}

/// Computes one aggregate row over the whole table and appends it.
///
/// Numeric columns get the arithmetic mean of their non-missing values;
/// textual columns get the most frequent value (first-encountered wins ties),
/// or `N/A` when no values exist. All-missing columns stay blank. The row is
/// appended without a header, in the file's existing column positions.
///
/// Running the pass twice would fold the first summary row into the second
/// aggregate, so a sidecar marker file (`<path>.summarized`) records a
/// completed pass; when the marker exists the call warns and no-ops.
pub fn append_summary(path: &Path) -> Result<SummaryOutcome, StorageError> {
    if !path.exists() {
        warn!(path = %path.display(), "output file missing, skipping summary");
        return Ok(SummaryOutcome::MissingFile);
    }

    let marker = marker_path(path);
    if marker.exists() {
        warn!(path = %path.display(), "file already summarized, skipping");
        return Ok(SummaryOutcome::AlreadySummarized);
    }

    let mut reader = csv::Reader::from_path(path)?;
    let column_count = reader.headers()?.len();

    // Column-major collection of raw cells; empty cells are missing values.
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); column_count];
    for result in reader.records() {
        let row = result?;
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            if !cell.is_empty() {
                columns[idx].push(cell.to_string());
            }
        }
    }

    let summary: Vec<String> = columns.iter().map(|values| summarize_column(values)).collect();

    let file = OpenOptions::new().append(true).open(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&summary)?;
    writer.flush().map_err(StorageError::Io)?;

    std::fs::write(&marker, b"")?;

    info!(path = %path.display(), "summary row appended");
    Ok(SummaryOutcome::Appended)
}

/// Sidecar marker recording a completed summarization pass.
fn marker_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".summarized");
    PathBuf::from(s)
}

/// Aggregates one column: mean when every value is numeric, mode otherwise.
fn summarize_column(values: &[String]) -> String {
    if values.is_empty() {
        // Nothing to aggregate; an all-missing numeric column stays blank.
        return String::new();
    }

    let numbers: Vec<f64> = values.iter().filter_map(|v| v.parse::<f64>().ok()).collect();
    if numbers.len() == values.len() {
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        return mean.to_string();
    }

    mode(values).unwrap_or_else(|| "N/A".to_string())
}

/// Most frequent value; ties broken by first-encountered-during-scan order.
fn mode(values: &[String]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((value.as_str(), 1)),
        }
    }

    // Strict > keeps the first-encountered value on ties; counts preserve
    // scan order.
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}
