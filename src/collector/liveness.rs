//! Liveness monitor that detects the monitored workload in the process table.

use std::path::Path;

use crate::collector::traits::FileSystem;

/// Polls the process table for a command-line token.
///
/// This is a stateless polling primitive, not an event subscription: each
/// call re-enumerates `/proc` from scratch.
pub struct LivenessMonitor<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> LivenessMonitor<F> {
    /// Creates a new liveness monitor.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Returns true if any visible process's command line contains `token`,
    /// case-insensitively.
    ///
    /// Processes that exit between enumeration and inspection, or whose
    /// cmdline is unreadable, are skipped rather than reported as errors.
    /// First match wins; no ordering is guaranteed across processes.
    pub fn is_running(&self, token: &str) -> bool {
        let token = token.to_lowercase();

        let entries = match self.fs.read_dir(Path::new(&self.proc_path)) {
            Ok(entries) => entries,
            Err(_) => return false,
        };

        for entry in entries {
            // Only numeric directories are processes.
            let is_pid = entry
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
            if !is_pid {
                continue;
            }

            let Ok(cmdline) = self.fs.read_to_string(&entry.join("cmdline")) else {
                continue;
            };

            let joined = cmdline.replace('\0', " ").to_lowercase();
            if joined.contains(&token) {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    fn monitor(fs: MockFs) -> LivenessMonitor<MockFs> {
        LivenessMonitor::new(fs, "/proc")
    }

    #[test]
    fn matches_token_in_cmdline() {
        let mut fs = MockFs::new();
        fs.add_process(42, "/usr/bin/python3\0query_0.sql\0--flag\0");

        assert!(monitor(fs).is_running("query_0.sql"));
    }

    #[test]
    fn no_match_for_other_cmdline() {
        let mut fs = MockFs::new();
        fs.add_process(42, "/usr/bin/python3\0other.sql\0");

        assert!(!monitor(fs).is_running("query_0.sql"));
    }

    #[test]
    fn match_is_case_insensitive() {
        let mut fs = MockFs::new();
        fs.add_process(7, "/usr/bin/python3\0Query_0.SQL\0");

        assert!(monitor(fs).is_running("query_0.sql"));
    }

    #[test]
    fn empty_process_table_is_not_running() {
        let mut fs = MockFs::new();
        fs.add_dir("/proc");

        assert!(!monitor(fs).is_running("query_0.sql"));
    }

    #[test]
    fn missing_proc_root_is_not_running() {
        assert!(!monitor(MockFs::new()).is_running("query_0.sql"));
    }

    #[test]
    fn unreadable_cmdline_is_skipped() {
        let mut fs = MockFs::new();
        // Directory exists but cmdline file is absent (process exited or
        // permission denied).
        fs.add_dir("/proc/99");
        fs.add_process(100, "/usr/bin/python3\0query_0.sql\0");

        assert!(monitor(fs).is_running("query_0.sql"));
    }

    #[test]
    fn non_numeric_entries_are_ignored() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu 1 2 3 4\n");
        fs.add_file("/proc/self/cmdline", "query_0.sql\0");

        assert!(!monitor(fs).is_running("query_0.sql"));
    }
}
