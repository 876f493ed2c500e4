//! Data models for sampled metrics.
//!
//! One `MetricRecord` is produced per sampling tick by merging a
//! `SystemSnapshot` (OS counters) and a `DatabaseSnapshot` (PostgreSQL
//! statistics). The two snapshots use disjoint key namespaces, so the merge
//! never collides.

/// A single metric value: integer counter, float gauge, or label.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Renders the value as a CSV cell.
    ///
    /// A NaN float renders as an empty cell — the "no data" sentinel.
    pub fn to_cell(&self) -> String {
        match self {
            MetricValue::Int(v) => v.to_string(),
            MetricValue::Float(v) if v.is_nan() => String::new(),
            MetricValue::Float(v) => v.to_string(),
            MetricValue::Text(s) => s.clone(),
        }
    }
}

/// One flat record of metrics for a single tick.
///
/// Keys come from a fixed vocabulary and keep their insertion order; the CSV
/// column order of an output file is the key order of the first record
/// written to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    entries: Vec<(&'static str, MetricValue)>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key/value pair.
    ///
    /// Keys are expected to be unique within a record; samplers own disjoint
    /// namespaces so this is not re-checked at runtime.
    pub fn push(&mut self, key: &'static str, value: MetricValue) {
        debug_assert!(
            self.entries.iter().all(|(k, _)| *k != key),
            "duplicate metric key: {key}"
        );
        self.entries.push((key, value));
    }

    /// Merges another record into this one, preserving order: existing
    /// entries first, then the other record's entries.
    pub fn merge(&mut self, other: MetricRecord) {
        self.entries.extend(other.entries);
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    /// Values in insertion order, rendered as CSV cells.
    pub fn cells(&self) -> Vec<String> {
        self.entries.iter().map(|(_, v)| v.to_cell()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// OS-level counters for one tick.
///
/// CPU percentages are instantaneous since the previous sample (since boot on
/// the first sample), not an average over the tick interval. I/O counts are
/// cumulative since boot; consumers wanting a rate must difference
/// consecutive records themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemSnapshot {
    /// User-mode CPU time, percent of the elapsed window.
    pub cpu_user: f64,
    /// Kernel-mode CPU time, percent of the elapsed window.
    pub cpu_system: f64,
    /// Used physical memory in bytes (total - free - buffers - cached).
    pub memory_used: u64,
    /// Free physical memory in bytes.
    pub memory_free: u64,
    /// Reads completed across physical disks, cumulative.
    pub io_read: u64,
    /// Writes completed across physical disks, cumulative.
    pub io_write: u64,
}

impl SystemSnapshot {
    /// Converts the snapshot into its metric-record entries.
    pub fn into_record(self) -> MetricRecord {
        let mut record = MetricRecord::new();
        record.push("cpu_user", MetricValue::Float(self.cpu_user));
        record.push("cpu_system", MetricValue::Float(self.cpu_system));
        record.push("memory_used", MetricValue::Int(self.memory_used as i64));
        record.push("memory_free", MetricValue::Int(self.memory_free as i64));
        record.push("io_read", MetricValue::Int(self.io_read as i64));
        record.push("io_write", MetricValue::Int(self.io_write as i64));
        record
    }
}

/// PostgreSQL-internal statistics for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSnapshot {
    /// Total sessions in pg_stat_activity.
    pub session_count: i64,
    /// Name of the monitored database.
    pub db_name: String,
    /// Committed transactions for the monitored database, cumulative.
    pub xact_commit: i64,
    /// Rolled-back transactions for the monitored database, cumulative.
    pub xact_rollback: i64,
    /// Buffers allocated by the background writer, cumulative.
    pub buffers_alloc: i64,
    /// Buffers written directly by backends, cumulative (0 on PG 17+ where
    /// the counter moved out of pg_stat_bgwriter).
    pub buffers_backend: i64,
    /// Name of the user table whose block I/O counters are sampled.
    pub table_name: String,
    /// Heap blocks read from disk for that table, cumulative.
    pub heap_blks_read: i64,
    /// Heap blocks found in the buffer cache for that table, cumulative.
    pub heap_blks_hit: i64,
    /// Cluster-wide cache-hit ratio in 0..1; NaN when there is no block I/O
    /// to measure (cold cluster).
    pub cache_hit_ratio: f64,
    /// Sessions running one query for longer than five minutes.
    pub long_running_queries: i64,
    /// Requested-but-not-granted locks.
    pub ungranted_locks: i64,
}

impl DatabaseSnapshot {
    /// Converts the snapshot into its metric-record entries.
    pub fn into_record(self) -> MetricRecord {
        let mut record = MetricRecord::new();
        record.push("pg_session_count", MetricValue::Int(self.session_count));
        record.push("pg_db_name", MetricValue::Text(self.db_name));
        record.push("pg_xact_commit", MetricValue::Int(self.xact_commit));
        record.push("pg_xact_rollback", MetricValue::Int(self.xact_rollback));
        record.push("pg_buffers_alloc", MetricValue::Int(self.buffers_alloc));
        record.push("pg_buffers_backend", MetricValue::Int(self.buffers_backend));
        record.push("pg_disk_io_table_name", MetricValue::Text(self.table_name));
        record.push("pg_heap_blks_read", MetricValue::Int(self.heap_blks_read));
        record.push("pg_heap_blks_hit", MetricValue::Int(self.heap_blks_hit));
        record.push("pg_cache_hit_ratio", MetricValue::Float(self.cache_hit_ratio));
        record.push(
            "pg_long_running_queries",
            MetricValue::Int(self.long_running_queries),
        );
        record.push("pg_ungranted_locks", MetricValue::Int(self.ungranted_locks));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_system_columns_first() {
        let system = SystemSnapshot {
            cpu_user: 12.5,
            ..Default::default()
        };
        let database = DatabaseSnapshot {
            db_name: "tpcds".to_string(),
            ..Default::default()
        };

        let mut record = system.into_record();
        record.merge(database.into_record());

        let columns = record.columns();
        assert_eq!(columns.len(), 18);
        assert_eq!(columns[0], "cpu_user");
        assert_eq!(columns[5], "io_write");
        assert_eq!(columns[6], "pg_session_count");
        assert_eq!(columns[17], "pg_ungranted_locks");
    }

    #[test]
    fn nan_float_renders_as_empty_cell() {
        assert_eq!(MetricValue::Float(f64::NAN).to_cell(), "");
        assert_eq!(MetricValue::Float(0.75).to_cell(), "0.75");
        assert_eq!(MetricValue::Int(42).to_cell(), "42");
        assert_eq!(MetricValue::Text("tpcds".into()).to_cell(), "tpcds");
    }
}
