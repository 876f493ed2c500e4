//! SQL builders for the PostgreSQL statistics probes.

/// Threshold beyond which an active query counts as long-running.
pub(super) const LONG_RUNNING_THRESHOLD: &str = "5 minutes";

/// Total session count from pg_stat_activity.
pub(super) const SESSION_COUNT_QUERY: &str = "SELECT count(*) FROM pg_stat_activity";

/// Commit/rollback counters for one database.
pub(super) const DATABASE_STATS_QUERY: &str = "\
    SELECT datname, xact_commit, xact_rollback \
    FROM pg_stat_database \
    WHERE datname = $1";

/// Builds the version-aware bgwriter buffer-counter query.
///
/// PostgreSQL 17 removed `buffers_backend` from pg_stat_bgwriter (it moved
/// to pg_stat_io); on 17+ the counter is reported as 0.
pub(super) fn build_bgwriter_query(server_version_num: Option<i32>) -> String {
    let v = server_version_num.unwrap_or(0);

    if v >= 170000 {
        "SELECT COALESCE(buffers_alloc, 0)::bigint AS buffers_alloc, \
                0::bigint AS buffers_backend \
         FROM pg_stat_bgwriter"
            .to_string()
    } else {
        "SELECT COALESCE(buffers_alloc, 0)::bigint AS buffers_alloc, \
                COALESCE(buffers_backend, 0)::bigint AS buffers_backend \
         FROM pg_stat_bgwriter"
            .to_string()
    }
}

/// Builds the single-table block I/O query.
///
/// With an explicit table the row is pinned by name; otherwise the
/// alphabetically first user table is taken so the monitored table stays
/// stable across ticks.
pub(super) fn build_table_io_query(explicit_table: bool) -> String {
    if explicit_table {
        "SELECT relname, heap_blks_read, heap_blks_hit \
         FROM pg_statio_user_tables \
         WHERE relname = $1"
            .to_string()
    } else {
        "SELECT relname, heap_blks_read, heap_blks_hit \
         FROM pg_statio_user_tables \
         ORDER BY relname LIMIT 1"
            .to_string()
    }
}

/// Cluster-wide cache-hit ratio over all user tables.
///
/// NULLIF keeps a cold cluster (zero hits and zero reads) from raising
/// division_by_zero; the NULL result maps to the NaN sentinel.
pub(super) const CACHE_HIT_RATIO_QUERY: &str = "\
    SELECT sum(heap_blks_hit)::double precision \
           / NULLIF(sum(heap_blks_hit) + sum(heap_blks_read), 0)::double precision \
    FROM pg_statio_user_tables";

/// Count of non-idle sessions whose current query outran the threshold.
pub(super) fn build_long_running_query() -> String {
    format!(
        "SELECT count(*) FROM pg_stat_activity \
         WHERE state != 'idle' \
         AND now() - query_start > interval '{}'",
        LONG_RUNNING_THRESHOLD
    )
}

/// Count of requested-but-not-granted locks.
pub(super) const UNGRANTED_LOCKS_QUERY: &str =
    "SELECT count(*) FROM pg_locks WHERE granted = false";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgwriter_query_pre_pg17_reads_buffers_backend() {
        let q = build_bgwriter_query(Some(160000));
        assert!(q.contains("COALESCE(buffers_backend, 0)"));
    }

    #[test]
    fn bgwriter_query_pg17_zeroes_buffers_backend() {
        let q = build_bgwriter_query(Some(170000));
        assert!(q.contains("0::bigint AS buffers_backend"));
        assert!(!q.contains("COALESCE(buffers_backend"));
    }

    #[test]
    fn bgwriter_query_unknown_version_uses_legacy_columns() {
        let q = build_bgwriter_query(None);
        assert!(q.contains("COALESCE(buffers_backend, 0)"));
    }

    #[test]
    fn table_io_query_pins_or_orders() {
        let pinned = build_table_io_query(true);
        assert!(pinned.contains("WHERE relname = $1"));
        assert!(!pinned.contains("ORDER BY"));

        let first = build_table_io_query(false);
        assert!(first.contains("ORDER BY relname LIMIT 1"));
    }

    #[test]
    fn long_running_query_embeds_threshold() {
        let q = build_long_running_query();
        assert!(q.contains("interval '5 minutes'"));
        assert!(q.contains("state != 'idle'"));
    }
}
