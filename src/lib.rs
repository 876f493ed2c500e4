//! pgmon — library behind the `pgmond` metrics-collection daemon.
//!
//! Provides:
//! - `collector` — OS-counter sampling (`/proc`), PostgreSQL statistics
//!   probes, and workload liveness detection
//! - `storage` — metric records, the buffered CSV writer, and the post-run
//!   summarizer
//! - `config` — resolved daemon configuration
//! - `daemon` — the orchestrating collection loop

pub mod collector;
pub mod config;
pub mod daemon;
pub mod storage;
