//! Optional metrics instrumentation for cairn.
//!
//! When the `observe` feature is enabled, key operations emit counters and
//! histograms via the [`metrics`] crate. A downstream application must
//! install a metrics recorder (e.g. `metrics-exporter-prometheus`) to
//! collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a physical transaction commit (counter + latency histogram).
///
/// - `cairn.txn.commits_total` – counter with `mode` and `outcome` labels
/// - `cairn.txn.commit_duration_seconds` – histogram with `mode` label
#[inline]
pub fn record_commit(mode: &'static str, duration: std::time::Duration, success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!("cairn.txn.commits_total", "mode" => mode, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("cairn.txn.commit_duration_seconds", "mode" => mode)
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (mode, duration, success);
    }
}

/// Record a transaction that was rolled back instead of committed.
///
/// - `cairn.txn.aborts_total` – counter with `mode` label
#[inline]
pub fn record_abort(mode: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("cairn.txn.aborts_total", "mode" => mode).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = mode;
    }
}

/// Record how many entries a cursor scan visited.
///
/// - `cairn.scan.entries_visited_total` – counter with `op` label
///   (`keys` / `iterate` / `filter` / `count`)
#[inline]
pub fn record_scan(op: &'static str, visited: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("cairn.scan.entries_visited_total", "op" => op)
            .increment(visited as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (op, visited);
    }
}

/// Record a confirmed store drop.
///
/// - `cairn.store.drops_total` – counter
#[inline]
pub fn record_drop() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("cairn.store.drops_total").increment(1);
    }
}
