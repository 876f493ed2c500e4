//! Orchestration of the collection run.
//!
//! The run is a small state machine: establish the connection pool and the
//! writer, then loop on a fixed cadence — liveness check, acquire one pooled
//! connection, sample system and database concurrently, merge, buffer — and
//! on liveness loss or the first fatal sampling error close the pool, force
//! a final flush and append the summary row.
//!
//! The loop is strictly sequential: exactly one tick is in flight at a time,
//! so the writer needs no locking and no two ticks ever hold a pooled
//! connection simultaneously.

use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::NoTls;
use tracing::{error, info, warn};

use crate::collector::liveness::LivenessMonitor;
use crate::collector::procfs::system::{CollectError, SystemCollector};
use crate::collector::traits::FileSystem;
use crate::collector::{PgSampleError, PostgresSampler};
use crate::config::DaemonConfig;
use crate::storage::csv_buffer::{CsvBuffer, StorageError};
use crate::storage::summary::append_summary;

/// Error type for a collection run.
#[derive(Debug)]
pub enum RunError {
    /// Connection pool could not be constructed.
    PoolSetup(deadpool_postgres::CreatePoolError),
    /// Acquiring a pooled connection failed.
    PoolAcquire(deadpool_postgres::PoolError),
    /// OS-counter sampling failed.
    System(CollectError),
    /// Database sampling failed.
    Database(PgSampleError),
    /// Writing or summarizing records failed.
    Storage(StorageError),
    /// The blocking sampler task panicked or was cancelled.
    SamplerTask(tokio::task::JoinError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::PoolSetup(e) => write!(f, "pool setup failed: {}", e),
            RunError::PoolAcquire(e) => write!(f, "connection acquisition failed: {}", e),
            RunError::System(e) => write!(f, "system sampling failed: {}", e),
            RunError::Database(e) => write!(f, "database sampling failed: {}", e),
            RunError::Storage(e) => write!(f, "storage failed: {}", e),
            RunError::SamplerTask(e) => write!(f, "sampler task failed: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

impl From<deadpool_postgres::CreatePoolError> for RunError {
    fn from(e: deadpool_postgres::CreatePoolError) -> Self {
        RunError::PoolSetup(e)
    }
}

impl From<deadpool_postgres::PoolError> for RunError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        RunError::PoolAcquire(e)
    }
}

impl From<CollectError> for RunError {
    fn from(e: CollectError) -> Self {
        RunError::System(e)
    }
}

impl From<PgSampleError> for RunError {
    fn from(e: PgSampleError) -> Self {
        RunError::Database(e)
    }
}

impl From<StorageError> for RunError {
    fn from(e: StorageError) -> Self {
        RunError::Storage(e)
    }
}

impl From<tokio::task::JoinError> for RunError {
    fn from(e: tokio::task::JoinError) -> Self {
        RunError::SamplerTask(e)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    /// Number of sampling ticks that produced a record.
    pub ticks: u64,
}

/// The metrics-collection daemon.
pub struct Daemon<F: FileSystem + Clone + Send + 'static> {
    config: DaemonConfig,
    fs: F,
    pool: Pool,
    liveness: LivenessMonitor<F>,
    // Moved into spawn_blocking per tick and handed back; None only while a
    // sample is in flight.
    system: Option<SystemCollector<F>>,
    pg: PostgresSampler,
    writer: CsvBuffer,
}

impl<F: FileSystem + Clone + Send + 'static> Daemon<F> {
    /// Builds the pool and the writer.
    ///
    /// The pool holds at most one connection — one exclusive connection per
    /// tick, released before the next tick acquires. No connection is opened
    /// until the first tick asks for one.
    pub fn new(fs: F, config: DaemonConfig) -> Result<Self, RunError> {
        let mut pool_config = PoolConfig::new();
        pool_config.host = Some(config.pg.host.clone());
        pool_config.port = Some(config.pg.port);
        pool_config.user = Some(config.pg.user.clone());
        if !config.pg.password.is_empty() {
            pool_config.password = Some(config.pg.password.clone());
        }
        pool_config.dbname = Some(config.pg.database.clone());
        pool_config.pool = Some(deadpool_postgres::PoolConfig::new(1));

        let pool = pool_config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        let mut pg = PostgresSampler::new(&config.pg.database);
        if let Some(ref table) = config.stats_table {
            pg = pg.with_table(table);
        }

        let writer = CsvBuffer::new(&config.output, config.flush_threshold);

        Ok(Self {
            liveness: LivenessMonitor::new(fs.clone(), &config.proc_path),
            system: Some(SystemCollector::new(fs.clone(), &config.proc_path)),
            fs,
            pg,
            writer,
            pool,
            config,
        })
    }

    /// Runs the collection loop until liveness loss or a fatal error, then
    /// performs the shutdown sequence.
    ///
    /// A fatal tick error ends the run but is not returned: the daemon logs
    /// it, flushes what it has and summarizes, like a clean stop.
    pub async fn run(mut self) -> Result<RunReport, RunError> {
        info!(
            interval = self.config.interval.as_secs(),
            output = %self.config.output.display(),
            token = %self.config.liveness_token,
            "starting collection loop"
        );

        let mut report = RunReport::default();
        let mut ticker = tokio::time::interval(self.config.interval);

        let outcome = loop {
            ticker.tick().await;

            if !self.liveness.is_running(&self.config.liveness_token) {
                info!(
                    token = %self.config.liveness_token,
                    "monitored workload no longer running, stopping"
                );
                break Ok(());
            }

            match self.sample_tick().await {
                Ok(()) => {
                    report.ticks += 1;
                    info!(tick = report.ticks, pending = self.writer.pending(), "tick recorded");
                }
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = outcome {
            error!(error = %e, "fatal sampling error, stopping");
        }

        self.shutdown(report)
    }

    /// One sampling tick: acquire a connection, sample both sides
    /// concurrently, merge and buffer.
    async fn sample_tick(&mut self) -> Result<(), RunError> {
        // Scoped: the connection returns to the pool at the end of the tick.
        let conn = self.pool.get().await?;

        // Handed back at the end of every tick; a fresh collector (losing
        // only the previous cpu reading) covers the cancelled-task case.
        let mut collector = self
            .system
            .take()
            .unwrap_or_else(|| SystemCollector::new(self.fs.clone(), &self.config.proc_path));
        let system_task = tokio::task::spawn_blocking(move || {
            let snapshot = collector.sample();
            (collector, snapshot)
        });

        let (system_result, database_result) =
            tokio::join!(system_task, self.pg.sample(&conn));

        let (collector, system_snapshot) = system_result?;
        self.system = Some(collector);

        let mut record = system_snapshot?.into_record();
        record.merge(database_result?.into_record());
        self.writer.append(record)?;

        Ok(())
    }

    /// Shutdown sequence: close the pool, force the final flush, summarize.
    fn shutdown(mut self, report: RunReport) -> Result<RunReport, RunError> {
        info!(ticks = report.ticks, "shutting down");

        self.pool.close();

        if let Err(e) = self.writer.flush() {
            // Surfaced but not retried; the summary pass may still work on
            // whatever reached disk.
            error!(error = %e, "final flush failed");
        }

        match append_summary(self.writer.path()) {
            Ok(outcome) => info!(?outcome, "summary pass finished"),
            Err(e) => warn!(error = %e, "summary pass failed"),
        }

        info!("shutdown complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use std::time::Duration;

    fn test_config(dir: &tempfile::TempDir) -> DaemonConfig {
        DaemonConfig {
            interval: Duration::from_millis(10),
            output: dir.path().join("metrics.csv"),
            liveness_token: "query_0.sql".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn liveness_loss_on_first_check_means_zero_ticks() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.liveness_token = "never-running-workload".to_string();

        // No process matches the token; no connection is ever opened.
        let daemon = Daemon::new(MockFs::typical_system(), config.clone()).unwrap();
        let report = daemon.run().await.unwrap();

        assert_eq!(report.ticks, 0);
        // Nothing buffered, so flush was a no-op and no file was created;
        // the summary pass no-ops on the absent file.
        assert!(!config.output.exists());
    }

    #[tokio::test]
    async fn empty_process_table_stops_immediately() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);

        let mut fs = MockFs::new();
        fs.add_dir("/proc");

        let daemon = Daemon::new(fs, config).unwrap();
        let report = daemon.run().await.unwrap();
        assert_eq!(report.ticks, 0);
    }
}
