//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string
//! inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Aggregate CPU jiffy counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Sum of all accounted jiffies.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Parses the aggregate `cpu` line out of `/proc/stat` content.
///
/// Per-CPU lines (`cpu0`, `cpu1`, ...) are ignored; only the first aggregate
/// line is used.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, ParseError> {
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"cpu") {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        return Ok(CpuTimes {
            user: get_val(1),
            nice: get_val(2),
            system: get_val(3),
            idle: get_val(4),
            iowait: get_val(5),
            irq: get_val(6),
            softirq: get_val(7),
            steal: get_val(8),
        });
    }

    Err(ParseError::new("missing aggregate cpu line in stat"))
}

/// Memory counters from `/proc/meminfo`, in kilobytes as reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub buffers: u64,
    pub cached: u64,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.mem_total = parse_kb(line);
        } else if line.starts_with("MemFree:") {
            info.mem_free = parse_kb(line);
        } else if line.starts_with("Buffers:") {
            info.buffers = parse_kb(line);
        } else if line.starts_with("Cached:") && !line.starts_with("SwapCached:") {
            info.cached = parse_kb(line);
        }
    }

    if info.mem_total == 0 {
        return Err(ParseError::new("missing MemTotal in meminfo"));
    }

    Ok(info)
}

/// Completed-I/O counters for one block device from `/proc/diskstats`.
#[derive(Debug, Clone, Default)]
pub struct DiskCounters {
    /// Device name (sda, nvme0n1, etc.)
    pub device: String,
    /// Number of reads completed.
    pub reads: u64,
    /// Number of writes completed.
    pub writes: u64,
}

/// Parses `/proc/diskstats` content.
///
/// Format: major minor name reads r_merged r_sectors r_time writes w_merged
/// w_sectors w_time io_pending io_time w_io_time [discards ...]
pub fn parse_diskstats(content: &str) -> Result<Vec<DiskCounters>, ParseError> {
    let mut disks = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue; // Skip malformed lines
        }

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        disks.push(DiskCounters {
            device: parts[2].to_string(),
            reads: get_val(3),
            writes: get_val(7),
        });
    }

    Ok(disks)
}

/// Returns true if the device name looks like a partition rather than a
/// whole disk (`sda1`, `nvme0n1p2`, `mmcblk0p1`).
///
/// Whole-disk counters already include their partitions' traffic, so
/// partitions must be excluded to avoid double counting.
pub fn is_partition(device: &str) -> bool {
    if let Some(rest) = device.strip_prefix("nvme") {
        rest.contains('p')
    } else if let Some(rest) = device.strip_prefix("mmcblk") {
        rest.contains('p')
    } else {
        device.ends_with(|c: char| c.is_ascii_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  10000 500 3000 86000 400 0 100 0 0 0\n\
                        cpu0 2500 125 750 21500 100 0 25 0 0 0\n\
                        ctxt 500000\n\
                        btime 1700000000\n";

    #[test]
    fn parse_cpu_times_reads_aggregate_line() {
        let times = parse_cpu_times(STAT).unwrap();
        assert_eq!(times.user, 10000);
        assert_eq!(times.nice, 500);
        assert_eq!(times.system, 3000);
        assert_eq!(times.idle, 86000);
        assert_eq!(times.iowait, 400);
        assert_eq!(times.total(), 100000);
    }

    #[test]
    fn parse_cpu_times_rejects_content_without_cpu_line() {
        let err = parse_cpu_times("ctxt 5\nbtime 1\n").unwrap_err();
        assert!(err.message.contains("cpu"));
    }

    #[test]
    fn parse_meminfo_extracts_counters() {
        let content = "MemTotal:       16384000 kB\n\
                       MemFree:         8192000 kB\n\
                       Buffers:          512000 kB\n\
                       Cached:          2048000 kB\n\
                       SwapCached:        10000 kB\n";
        let info = parse_meminfo(content).unwrap();
        assert_eq!(info.mem_total, 16384000);
        assert_eq!(info.mem_free, 8192000);
        assert_eq!(info.buffers, 512000);
        // SwapCached must not clobber Cached.
        assert_eq!(info.cached, 2048000);
    }

    #[test]
    fn parse_meminfo_without_total_is_error() {
        assert!(parse_meminfo("MemFree: 100 kB\n").is_err());
    }

    #[test]
    fn parse_diskstats_reads_counters() {
        let content =
            "8 0 sda 12345 100 987654 4000 6789 50 456789 8000 0 4000 8000 0 0 0 0\n\
             259 0 nvme0n1 50000 0 2000000 1000 30000 0 1500000 2000 0 1500 3000 0 0 0 0\n";
        let disks = parse_diskstats(content).unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].device, "sda");
        assert_eq!(disks[0].reads, 12345);
        assert_eq!(disks[0].writes, 6789);
        assert_eq!(disks[1].device, "nvme0n1");
        assert_eq!(disks[1].reads, 50000);
    }

    #[test]
    fn parse_diskstats_skips_short_lines() {
        let disks = parse_diskstats("8 0 sda 1 2 3\n").unwrap();
        assert!(disks.is_empty());
    }

    #[test]
    fn partition_detection() {
        assert!(is_partition("sda1"));
        assert!(is_partition("nvme0n1p1"));
        assert!(is_partition("mmcblk0p2"));
        assert!(!is_partition("sda"));
        assert!(!is_partition("nvme0n1"));
        assert!(!is_partition("mmcblk0"));
        assert!(!is_partition("vda"));
    }
}
