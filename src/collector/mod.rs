//! Samplers feeding the collection loop.
//!
//! Three independent pieces produce and gate each tick:
//!
//! - `SystemCollector` reads OS counters from the Linux `/proc` filesystem;
//! - `PostgresSampler` probes PostgreSQL statistics views over a pooled
//!   connection;
//! - `LivenessMonitor` scans the process table for the monitored workload.
//!
//! Everything touching `/proc` goes through the `FileSystem` trait so tests
//! can run against `MockFs` fixtures on any platform.

pub mod liveness;
pub mod mock;
mod pg_collector;
pub mod procfs;
pub mod traits;

pub use liveness::LivenessMonitor;
pub use mock::MockFs;
pub use pg_collector::{PgSampleError, PostgresSampler};
pub use procfs::system::{CollectError, SystemCollector};
pub use traits::{FileSystem, RealFs};
