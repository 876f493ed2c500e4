//! Record buffering, CSV persistence and summarization.

pub mod csv_buffer;
pub mod model;
pub mod summary;

pub use csv_buffer::{CsvBuffer, DEFAULT_FLUSH_THRESHOLD, StorageError};
pub use model::{DatabaseSnapshot, MetricRecord, MetricValue, SystemSnapshot};
pub use summary::{SummaryOutcome, append_summary};
