use std::time::Instant;

use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::identity::IdentityProvider;
use crate::model::*;
use crate::observability::{self, COMMITS_REFUSED_TOTAL, COMMIT_DURATION_SECONDS, COMMIT_ENTRIES_TOTAL};
use crate::query::Filter;

use super::staging::{StagedChange, StagingSession};
use super::store::{RecordStore, StoreError};
use super::EngineError;

/// One staged entry that did not commit. The entry stays staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub member_id: Ulid,
    pub occurrence_id: Ulid,
    pub error: EngineError,
}

/// Outcome of a best-effort commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub succeeded: usize,
    /// Sorted by (member, occurrence).
    pub failures: Vec<CommitFailure>,
    /// Entries never attempted because the commit was cancelled.
    pub cancelled: usize,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }
}

/// What a successful entry did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Inserted,
    Updated,
    Deleted(usize),
}

impl Applied {
    fn label(&self) -> &'static str {
        match self {
            Applied::Inserted => "inserted",
            Applied::Updated => "updated",
            Applied::Deleted(_) => "deleted",
        }
    }
}

impl StagingSession {
    /// Apply every staged edit to the store, best effort.
    ///
    /// Permission is checked for the whole batch before any store access;
    /// a refusal fails the call and leaves everything staged. Otherwise each
    /// entry succeeds or fails on its own and nothing is rolled back.
    /// Successful entries leave the staged set; failed ones stay for retry.
    ///
    /// When `cancel` fires, entries not yet started are skipped (and stay
    /// staged); entries already applied are not undone.
    pub async fn commit<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        identity: &dyn IdentityProvider,
        cancel: &CancellationToken,
    ) -> Result<CommitReport, EngineError> {
        let started = Instant::now();

        for &(member_id, occurrence_id) in self.staged.keys() {
            if let Some(occurrence) = self.occurrences.get(&occurrence_id)
                && let Err(e) = self.check_permission(identity, occurrence, member_id)
            {
                metrics::counter!(COMMITS_REFUSED_TOTAL).increment(1);
                tracing::warn!("commit refused: {e}");
                return Err(e);
            }
        }

        let entries = self.staged();
        tracing::info!(entries = entries.len(), "committing staged availability changes");

        let outcomes: Vec<(StagedChange, Option<Result<Applied, EngineError>>)> = {
            let session = &*self;
            stream::iter(entries)
                .map(|change| async move {
                    if cancel.is_cancelled() {
                        return (change, None);
                    }
                    let outcome = session.apply(store, &change).await;
                    (change, Some(outcome))
                })
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await
        };

        let mut report = CommitReport::default();
        for (change, outcome) in outcomes {
            match outcome {
                None => report.cancelled += 1,
                Some(Ok(applied)) => {
                    self.staged.remove(&(change.member_id, change.occurrence_id));
                    report.succeeded += 1;
                    metrics::counter!(COMMIT_ENTRIES_TOTAL, "outcome" => applied.label()).increment(1);
                    tracing::debug!(
                        member = %change.member_id,
                        occurrence = %change.occurrence_id,
                        ?applied,
                        "staged change committed"
                    );
                }
                Some(Err(error)) => {
                    metrics::counter!(COMMIT_ENTRIES_TOTAL, "outcome" => observability::failure_label(&error))
                        .increment(1);
                    tracing::warn!(
                        member = %change.member_id,
                        occurrence = %change.occurrence_id,
                        "staged change failed: {error}"
                    );
                    report.failures.push(CommitFailure {
                        member_id: change.member_id,
                        occurrence_id: change.occurrence_id,
                        error,
                    });
                }
            }
        }
        report
            .failures
            .sort_by_key(|f| (f.member_id, f.occurrence_id));

        metrics::histogram!(COMMIT_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "commit finished"
        );
        Ok(report)
    }

    async fn apply<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        change: &StagedChange,
    ) -> Result<Applied, EngineError> {
        let status = match &change.target {
            StagedTarget::Status(status) => Some(*status),
            StagedTarget::Clear => None,
            StagedTarget::Unrecognized(raw) => {
                return Err(EngineError::Validation(format!(
                    "invalid availability status: {raw:?}"
                )));
            }
        };
        if !self.members.contains_key(&change.member_id) {
            return Err(EngineError::NotFound(change.member_id));
        }
        let occurrence = self
            .occurrences
            .get(&change.occurrence_id)
            .ok_or(EngineError::NotFound(change.occurrence_id))?;

        let key = occurrence.occurrence_ref();
        let filter = Filter::for_pair(change.member_id, key);

        let Some(status) = status else {
            let removed = store.delete_where(&filter).await?;
            return Ok(Applied::Deleted(removed));
        };

        if let Some(existing) = store.find_one(&filter).await? {
            store.update_status(existing.id, status).await?;
            return Ok(Applied::Updated);
        }

        match store
            .insert(NewAvailabilityRow::new(change.member_id, key, status))
            .await
        {
            Ok(_) => Ok(Applied::Inserted),
            Err(StoreError::UniqueViolation) => {
                tracing::debug!(
                    member = %change.member_id,
                    occurrence = %change.occurrence_id,
                    "insert lost a race, retrying as update"
                );
                let existing = store.find_one(&filter).await?.ok_or_else(|| {
                    EngineError::Store(format!(
                        "conflicting record for member {} vanished before retry",
                        change.member_id
                    ))
                })?;
                store.update_status(existing.id, status).await?;
                Ok(Applied::Updated)
            }
            Err(e) => Err(e.into()),
        }
    }
}
