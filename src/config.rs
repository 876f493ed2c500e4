//! Daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::csv_buffer::DEFAULT_FLUSH_THRESHOLD;

/// Fully-resolved configuration for one collection run.
///
/// Assembled from CLI arguments and PG* environment variables by the binary;
/// tests construct it directly.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Sampling cadence.
    pub interval: Duration,
    /// Output CSV path.
    pub output: PathBuf,
    /// Command-line substring identifying the monitored workload.
    pub liveness_token: String,
    /// Buffered rows before an automatic flush.
    pub flush_threshold: usize,
    /// Base path of the proc filesystem.
    pub proc_path: String,
    /// PostgreSQL connection parameters.
    pub pg: PgConfig,
    /// Explicitly pinned user table for block I/O stats.
    pub stats_table: Option<String>,
}

/// PostgreSQL connection parameters.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            output: PathBuf::from("tpcds_metrics_data.csv"),
            liveness_token: "query_0.sql".to_string(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            proc_path: "/proc".to_string(),
            pg: PgConfig::default(),
            stats_table: None,
        }
    }
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "tpcds".to_string(),
        }
    }
}
