//! In-memory mock filesystem for testing collectors without a real `/proc`.
//!
//! `MockFs` simulates a filesystem in memory, allowing tests to run on macOS
//! and in CI environments without Linux access.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores files and directories in memory, allowing tests to simulate
/// various `/proc` filesystem states.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }

        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.directories.insert(path.clone());

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Adds a process entry with its `/proc/[pid]/cmdline` file.
    ///
    /// The cmdline is stored as given; use NUL (`\0`) separators to emulate
    /// the real argument-vector encoding.
    pub fn add_process(&mut self, pid: u32, cmdline: &str) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_file(base.join("cmdline"), cmdline);
    }

    /// Creates a mock filesystem describing a small idle system.
    ///
    /// Contains `/proc/stat`, `/proc/meminfo` and `/proc/diskstats` with
    /// plausible counter values, plus a couple of running processes.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "cpu  10000 500 3000 86000 400 0 100 0 0 0\n\
             cpu0 2500 125 750 21500 100 0 25 0 0 0\n\
             cpu1 2500 125 750 21500 100 0 25 0 0 0\n\
             ctxt 500000\n\
             btime 1700000000\n\
             processes 10000\n\
             procs_running 2\n\
             procs_blocked 0\n",
        );

        fs.add_file(
            "/proc/meminfo",
            "MemTotal:       16384000 kB\n\
             MemFree:         8192000 kB\n\
             MemAvailable:   12000000 kB\n\
             Buffers:          512000 kB\n\
             Cached:          2048000 kB\n\
             SwapTotal:       4096000 kB\n\
             SwapFree:        4096000 kB\n",
        );

        fs.add_file(
            "/proc/diskstats",
            "8 0 sda 12345 100 987654 4000 6789 50 456789 8000 0 4000 8000 0 0 0 0\n\
             8 1 sda1 12000 90 900000 3800 6500 45 450000 7800 0 3900 7800 0 0 0 0\n\
             259 0 nvme0n1 50000 0 2000000 1000 30000 0 1500000 2000 0 1500 3000 0 0 0 0\n",
        );

        fs.add_process(1, "/sbin/init\0");
        fs.add_process(42, "/usr/bin/python3\0query_0.sql\0--flag\0");

        fs
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", path)))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{:?}", path),
            ));
        }

        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .chain(self.directories.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}
