//! PostgreSQL statistics sampler.
//!
//! Runs a fixed battery of read-only probes against these views:
//! - `pg_stat_activity` — session counts (total and long-running)
//! - `pg_stat_database` — commit/rollback counters for the monitored database
//! - `pg_stat_bgwriter` — buffer allocation counters (version-aware on PG 17+)
//! - `pg_statio_user_tables` — one table's block I/O plus the cluster-wide
//!   cache-hit ratio
//! - `pg_locks` — ungranted lock count
//!
//! Every invocation is a fresh read over an already-acquired pooled
//! connection; nothing is cached between ticks except the server version,
//! which only changes across reconnects to a different server.

mod queries;

use tokio_postgres::Client;
use tracing::debug;

use crate::storage::model::DatabaseSnapshot;
use queries::{
    CACHE_HIT_RATIO_QUERY, DATABASE_STATS_QUERY, SESSION_COUNT_QUERY, UNGRANTED_LOCKS_QUERY,
    build_bgwriter_query, build_long_running_query, build_table_io_query,
};

/// Error type for PostgreSQL sampling.
///
/// Any probe failure is fatal for the tick — there is no partial-record
/// degradation.
#[derive(Debug)]
pub enum PgSampleError {
    /// A statistics query failed.
    Query(tokio_postgres::Error),
    /// A probe that requires a row found none.
    NoRows(String),
}

impl std::fmt::Display for PgSampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PgSampleError::Query(e) => write!(f, "PostgreSQL query error: {}", format_pg_error(e)),
            PgSampleError::NoRows(what) => write!(f, "PostgreSQL: no rows for {}", what),
        }
    }
}

impl std::error::Error for PgSampleError {}

impl From<tokio_postgres::Error> for PgSampleError {
    fn from(e: tokio_postgres::Error) -> Self {
        PgSampleError::Query(e)
    }
}

/// Samples PostgreSQL-internal statistics over a pooled connection.
pub struct PostgresSampler {
    /// Database whose pg_stat_database row is monitored.
    database: String,
    /// Explicitly pinned user table for block I/O stats; alphabetically
    /// first user table when unset.
    table: Option<String>,
    /// Cached once per daemon run; used to pick version-aware queries.
    server_version_num: Option<i32>,
}

impl PostgresSampler {
    /// Creates a sampler monitoring the given database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: None,
            server_version_num: None,
        }
    }

    /// Pins the user table whose block I/O counters are sampled.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Runs the full probe battery and assembles one snapshot.
    ///
    /// Probes run in a fixed order; they are independent and side-effect
    /// free, so the order only affects total latency.
    pub async fn sample(&mut self, client: &Client) -> Result<DatabaseSnapshot, PgSampleError> {
        self.ensure_version(client).await?;

        let session_count = self.probe_session_count(client).await?;
        let (db_name, xact_commit, xact_rollback) = self.probe_database_stats(client).await?;
        let (buffers_alloc, buffers_backend) = self.probe_bgwriter(client).await?;
        let (table_name, heap_blks_read, heap_blks_hit) = self.probe_table_io(client).await?;
        let cache_hit_ratio = self.probe_cache_hit_ratio(client).await?;
        let long_running_queries = self.probe_long_running(client).await?;
        let ungranted_locks = self.probe_ungranted_locks(client).await?;

        Ok(DatabaseSnapshot {
            session_count,
            db_name,
            xact_commit,
            xact_rollback,
            buffers_alloc,
            buffers_backend,
            table_name,
            heap_blks_read,
            heap_blks_hit,
            cache_hit_ratio,
            long_running_queries,
            ungranted_locks,
        })
    }

    /// Determines the server version once per run.
    async fn ensure_version(&mut self, client: &Client) -> Result<(), PgSampleError> {
        if self.server_version_num.is_some() {
            return Ok(());
        }

        let row = client.query_one("SHOW server_version_num", &[]).await?;
        let version: String = row.get(0);
        self.server_version_num = version.parse::<i32>().ok();
        debug!(server_version_num = ?self.server_version_num, "server version determined");
        Ok(())
    }

    async fn probe_session_count(&self, client: &Client) -> Result<i64, PgSampleError> {
        let row = client.query_one(SESSION_COUNT_QUERY, &[]).await?;
        Ok(row.get(0))
    }

    async fn probe_database_stats(
        &self,
        client: &Client,
    ) -> Result<(String, i64, i64), PgSampleError> {
        let row = client
            .query_opt(DATABASE_STATS_QUERY, &[&self.database])
            .await?
            .ok_or_else(|| {
                PgSampleError::NoRows(format!("pg_stat_database entry '{}'", self.database))
            })?;
        Ok((row.get("datname"), row.get("xact_commit"), row.get("xact_rollback")))
    }

    async fn probe_bgwriter(&self, client: &Client) -> Result<(i64, i64), PgSampleError> {
        let query = build_bgwriter_query(self.server_version_num);
        let row = client.query_one(query.as_str(), &[]).await?;
        Ok((row.get("buffers_alloc"), row.get("buffers_backend")))
    }

    async fn probe_table_io(&self, client: &Client) -> Result<(String, i64, i64), PgSampleError> {
        let query = build_table_io_query(self.table.is_some());

        let row = match &self.table {
            Some(table) => client.query_opt(query.as_str(), &[table]).await?,
            None => client.query_opt(query.as_str(), &[]).await?,
        }
        .ok_or_else(|| {
            PgSampleError::NoRows(match &self.table {
                Some(table) => format!("pg_statio_user_tables entry '{}'", table),
                None => "pg_statio_user_tables".to_string(),
            })
        })?;

        Ok((row.get("relname"), row.get("heap_blks_read"), row.get("heap_blks_hit")))
    }

    async fn probe_cache_hit_ratio(&self, client: &Client) -> Result<f64, PgSampleError> {
        let row = client.query_one(CACHE_HIT_RATIO_QUERY, &[]).await?;
        let ratio: Option<f64> = row.get(0);
        Ok(no_data_to_nan(ratio))
    }

    async fn probe_long_running(&self, client: &Client) -> Result<i64, PgSampleError> {
        let query = build_long_running_query();
        let row = client.query_one(query.as_str(), &[]).await?;
        Ok(row.get(0))
    }

    async fn probe_ungranted_locks(&self, client: &Client) -> Result<i64, PgSampleError> {
        let row = client.query_one(UNGRANTED_LOCKS_QUERY, &[]).await?;
        Ok(row.get(0))
    }
}

/// Maps a NULL ratio (no block I/O observed yet) to the NaN sentinel.
fn no_data_to_nan(ratio: Option<f64>) -> f64 {
    ratio.unwrap_or(f64::NAN)
}

/// Formats a PostgreSQL error for display, preferring the server message.
fn format_pg_error(e: &tokio_postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        e.to_string()
    }
}
