use crate::limits::*;

/// Commit tuning. Read from the environment by hosts; tests build it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitConfig {
    /// Staged entries applied concurrently during one commit.
    pub concurrency: usize,
    /// Staged changes one session may hold.
    pub max_staged: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_COMMIT_CONCURRENCY,
            max_staged: MAX_STAGED_CHANGES,
        }
    }
}

impl CommitConfig {
    /// `LINEUP_COMMIT_CONCURRENCY` and `LINEUP_MAX_STAGED`; unset or
    /// unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let concurrency: usize = lookup("LINEUP_COMMIT_CONCURRENCY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.concurrency);
        let max_staged: usize = lookup("LINEUP_MAX_STAGED")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_staged);
        Self {
            concurrency,
            max_staged,
        }
        .clamped()
    }

    /// Keep values inside the supported range.
    pub fn clamped(self) -> Self {
        Self {
            concurrency: self.concurrency.clamp(1, MAX_COMMIT_CONCURRENCY),
            max_staged: self.max_staged.clamp(1, MAX_STAGED_CHANGES),
        }
    }
}
