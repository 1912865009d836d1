/// Maximum number of dates a single recurrence series may produce.
/// Longer series are truncated, not rejected.
pub const MAX_RECURRENCE_STEPS: usize = 1000;

/// Horizon for series without an end condition, in months from the origin.
pub const UNBOUNDED_HORIZON_MONTHS: u32 = 24;

/// Maximum number of staged changes held by one edit session.
pub const MAX_STAGED_CHANGES: usize = 10_000;

/// Default number of staged entries committed concurrently.
pub const DEFAULT_COMMIT_CONCURRENCY: usize = 8;

/// Upper bound for the configured commit fan-out.
pub const MAX_COMMIT_CONCURRENCY: usize = 64;
