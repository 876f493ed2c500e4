//! pgmond - System and PostgreSQL metrics collection daemon.
//!
//! Samples OS counters and PostgreSQL statistics on a fixed cadence, appends
//! one CSV row per tick, and stops on its own once the monitored workload
//! disappears from the process table. A single mean/mode summary row is
//! appended after the run.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error};
use tracing_subscriber::EnvFilter;

use pgmon::collector::RealFs;
use pgmon::config::{DaemonConfig, PgConfig};
use pgmon::daemon::Daemon;
use pgmon::storage::DEFAULT_FLUSH_THRESHOLD;

/// System and PostgreSQL metrics collection daemon.
#[derive(Parser)]
#[command(
    name = "pgmond",
    about = "System and PostgreSQL metrics collection daemon",
    version
)]
struct Args {
    /// Sampling interval in seconds.
    #[arg(short, long, default_value = "60")]
    interval: u64,

    /// Output CSV file.
    #[arg(short, long, default_value = "tpcds_metrics_data.csv")]
    output: PathBuf,

    /// Command-line substring identifying the monitored workload; collection
    /// stops once no process matches.
    #[arg(short, long, default_value = "query_0.sql")]
    token: String,

    /// Buffered rows before an automatic flush.
    #[arg(long, default_value_t = DEFAULT_FLUSH_THRESHOLD)]
    buffer_size: usize,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// PostgreSQL host.
    #[arg(long, env = "PGHOST", default_value = "localhost")]
    pg_host: String,

    /// PostgreSQL port.
    #[arg(long, env = "PGPORT", default_value = "5432")]
    pg_port: u16,

    /// PostgreSQL user.
    #[arg(long, env = "PGUSER", default_value = "postgres")]
    pg_user: String,

    /// PostgreSQL password.
    #[arg(long, env = "PGPASSWORD", default_value = "", hide_env_values = true)]
    pg_password: String,

    /// Database to connect to and monitor.
    #[arg(short, long, env = "PGDATABASE", default_value = "tpcds")]
    database: String,

    /// Pin the user table whose block I/O counters are sampled; defaults to
    /// the alphabetically first user table.
    #[arg(long)]
    table: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pgmond={}", level).parse().expect("valid directive"))
        .add_directive(format!("pgmon={}", level).parse().expect("valid directive"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    tracing::info!("pgmond {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Config: interval={}s, output={}, token={}, database={}",
        args.interval,
        args.output.display(),
        args.token,
        args.database
    );

    let config = DaemonConfig {
        interval: Duration::from_secs(args.interval),
        output: args.output,
        liveness_token: args.token,
        flush_threshold: args.buffer_size,
        proc_path: args.proc_path,
        pg: PgConfig {
            host: args.pg_host,
            port: args.pg_port,
            user: args.pg_user,
            password: args.pg_password,
            database: args.database,
        },
        stats_table: args.table,
    };

    let daemon = match Daemon::new(RealFs::new(), config) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match daemon.run().await {
        Ok(report) => {
            tracing::info!("Collected {} ticks", report.ticks);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
