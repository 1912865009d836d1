use crate::engine::EngineError;

// ── Commit metrics ──────────────────────────────────────────────

/// Counter: staged entries processed by commit. Labels: outcome.
pub const COMMIT_ENTRIES_TOTAL: &str = "lineup_commit_entries_total";

/// Histogram: wall time of one commit call in seconds.
pub const COMMIT_DURATION_SECONDS: &str = "lineup_commit_duration_seconds";

/// Counter: commits refused up front for lack of edit rights.
pub const COMMITS_REFUSED_TOTAL: &str = "lineup_commits_refused_total";

// ── Boundary / generation metrics ───────────────────────────────

/// Counter: store rows dropped at the boundary (bad key shape or status).
pub const RECORDS_SKIPPED_TOTAL: &str = "lineup_records_skipped_total";

/// Counter: recurrence series cut off at the step ceiling.
pub const SERIES_TRUNCATED_TOTAL: &str = "lineup_series_truncated_total";

/// Map a per-entry commit failure to a short outcome label.
pub fn failure_label(err: &EngineError) -> &'static str {
    match err {
        EngineError::Validation(_) => "validation_error",
        EngineError::NotFound(_) => "not_found",
        EngineError::Permission { .. } => "permission_denied",
        EngineError::Store(_) => "store_error",
        EngineError::LimitExceeded(_) => "limit_exceeded",
    }
}
