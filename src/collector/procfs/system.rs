//! System sampler gathering OS-level counters from `/proc`.

use std::path::Path;

use crate::collector::procfs::parser::{
    CpuTimes, is_partition, parse_cpu_times, parse_diskstats, parse_meminfo,
};
use crate::collector::traits::FileSystem;
use crate::storage::model::SystemSnapshot;

/// Error type for system-sampling failures.
///
/// Any failure here is fatal to the current tick; no partial snapshot is
/// substituted.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a `/proc` file.
    Io(std::io::Error),
    /// Parse error in a `/proc` file.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Samples system-wide counters from `/proc`.
///
/// The collector is stateful: CPU percentages are computed from the jiffy
/// delta against the previous `sample` call. The first call measures against
/// boot. Reads are synchronous; the orchestrator dispatches them to a
/// blocking worker so the scheduling loop is never stalled.
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
    prev_cpu: Option<CpuTimes>,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            prev_cpu: None,
        }
    }

    /// Collects one snapshot of CPU, memory and disk I/O counters.
    pub fn sample(&mut self) -> Result<SystemSnapshot, CollectError> {
        let (cpu_user, cpu_system) = self.sample_cpu()?;
        let (memory_used, memory_free) = self.sample_memory()?;
        let (io_read, io_write) = self.sample_disk_io()?;

        Ok(SystemSnapshot {
            cpu_user,
            cpu_system,
            memory_used,
            memory_free,
            io_read,
            io_write,
        })
    }

    /// Returns (user%, system%) over the window since the previous sample.
    fn sample_cpu(&mut self) -> Result<(f64, f64), CollectError> {
        let path = format!("{}/stat", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        let current = parse_cpu_times(&content).map_err(|e| CollectError::Parse(e.message))?;

        let prev = self.prev_cpu.replace(current).unwrap_or_default();
        Ok(cpu_percentages(prev, current))
    }

    /// Returns (used, free) physical memory in bytes.
    fn sample_memory(&self) -> Result<(u64, u64), CollectError> {
        let path = format!("{}/meminfo", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        let info = parse_meminfo(&content).map_err(|e| CollectError::Parse(e.message))?;

        let used_kb = info
            .mem_total
            .saturating_sub(info.mem_free)
            .saturating_sub(info.buffers)
            .saturating_sub(info.cached);

        Ok((used_kb * 1024, info.mem_free * 1024))
    }

    /// Returns cumulative (reads, writes) completed across physical disks.
    fn sample_disk_io(&self) -> Result<(u64, u64), CollectError> {
        let path = format!("{}/diskstats", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        let disks = parse_diskstats(&content).map_err(|e| CollectError::Parse(e.message))?;

        let mut reads = 0u64;
        let mut writes = 0u64;
        for disk in disks {
            // Partition counters are already included in the whole disk's.
            if is_partition(&disk.device) {
                continue;
            }
            reads += disk.reads;
            writes += disk.writes;
        }

        Ok((reads, writes))
    }
}

/// Computes (user%, system%) from two jiffy readings.
///
/// A zero or negative total delta (clock weirdness, identical readings)
/// yields 0.0 for both.
fn cpu_percentages(prev: CpuTimes, current: CpuTimes) -> (f64, f64) {
    let total_delta = current.total().saturating_sub(prev.total());
    if total_delta == 0 {
        return (0.0, 0.0);
    }

    let user_delta = current.user.saturating_sub(prev.user);
    let system_delta = current.system.saturating_sub(prev.system);

    let total = total_delta as f64;
    (
        user_delta as f64 / total * 100.0,
        system_delta as f64 / total * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn first_sample_measures_since_boot() {
        let fs = MockFs::typical_system();
        let mut collector = SystemCollector::new(fs, "/proc");

        let snapshot = collector.sample().unwrap();

        // typical_system: user=10000, system=3000, total=100000 jiffies.
        assert!((snapshot.cpu_user - 10.0).abs() < 1e-9);
        assert!((snapshot.cpu_system - 3.0).abs() < 1e-9);
    }

    #[test]
    fn second_sample_uses_jiffy_delta() {
        let mut fs = MockFs::typical_system();
        let mut collector = SystemCollector::new(fs.clone(), "/proc");
        collector.sample().unwrap();

        // Advance: +50 user, +25 system, +25 idle jiffies.
        fs.add_file(
            "/proc/stat",
            "cpu  10050 500 3025 86025 400 0 100 0 0 0\nbtime 1700000000\n",
        );
        let mut collector = SystemCollector {
            prev_cpu: collector.prev_cpu,
            ..SystemCollector::new(fs, "/proc")
        };

        let snapshot = collector.sample().unwrap();
        assert!((snapshot.cpu_user - 50.0).abs() < 1e-9);
        assert!((snapshot.cpu_system - 25.0).abs() < 1e-9);
    }

    #[test]
    fn identical_readings_yield_zero_percent() {
        let fs = MockFs::typical_system();
        let mut collector = SystemCollector::new(fs, "/proc");
        collector.sample().unwrap();

        let snapshot = collector.sample().unwrap();
        assert_eq!(snapshot.cpu_user, 0.0);
        assert_eq!(snapshot.cpu_system, 0.0);
    }

    #[test]
    fn memory_counters_are_bytes() {
        let fs = MockFs::typical_system();
        let mut collector = SystemCollector::new(fs, "/proc");

        let snapshot = collector.sample().unwrap();

        // used = (16384000 - 8192000 - 512000 - 2048000) kB
        assert_eq!(snapshot.memory_used, 5632000 * 1024);
        assert_eq!(snapshot.memory_free, 8192000 * 1024);
    }

    #[test]
    fn disk_io_sums_whole_disks_only() {
        let fs = MockFs::typical_system();
        let mut collector = SystemCollector::new(fs, "/proc");

        let snapshot = collector.sample().unwrap();

        // sda + nvme0n1; sda1 excluded.
        assert_eq!(snapshot.io_read, 12345 + 50000);
        assert_eq!(snapshot.io_write, 6789 + 30000);
    }

    #[test]
    fn missing_proc_file_is_fatal() {
        let fs = MockFs::new();
        let mut collector = SystemCollector::new(fs, "/proc");
        assert!(matches!(collector.sample(), Err(CollectError::Io(_))));
    }
}
