use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;
use crate::query::{Filter, Query};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row for the same (member, occurrence) pair already exists.
    UniqueViolation,
    NotFound(Ulid),
    InvalidRow(&'static str),
    /// Transport or backend failure.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UniqueViolation => write!(f, "unique (member, occurrence) constraint violated"),
            StoreError::NotFound(id) => write!(f, "row not found: {id}"),
            StoreError::InvalidRow(msg) => write!(f, "invalid row: {msg}"),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The availability table as the engine sees it: a generic keyed
/// collection with predicate reads and writes. Implementations must
/// enforce uniqueness of (member, occurrence).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<AvailabilityRow>, StoreError>;

    /// Zero or one row. If several match, the lowest id wins.
    async fn find_one(&self, filter: &Filter) -> Result<Option<AvailabilityRow>, StoreError>;

    async fn insert(&self, row: NewAvailabilityRow) -> Result<AvailabilityRow, StoreError>;

    async fn update_status(&self, id: Ulid, status: AvailabilityStatus) -> Result<(), StoreError>;

    /// Returns the number of rows removed.
    async fn delete_where(&self, filter: &Filter) -> Result<usize, StoreError>;
}

pub struct InMemoryStore {
    rows: DashMap<Ulid, AvailabilityRow>,
    unique: DashMap<(Ulid, OccurrenceRef), Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            unique: DashMap::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, id: &Ulid) -> Option<AvailabilityRow> {
        self.rows.get(id).map(|e| e.value().clone())
    }

    /// Load a row as-is, skipping the unique index and shape checks.
    /// Mirrors legacy data written before the constraint existed.
    pub fn import_row(&self, row: AvailabilityRow) {
        if let Some(key) = row.occurrence_ref() {
            self.unique.entry((row.member_id, key)).or_insert(row.id);
        }
        self.rows.insert(row.id, row);
    }

    fn matching(&self, filter: &Filter) -> Vec<AvailabilityRow> {
        let mut out: Vec<AvailabilityRow> = self
            .rows
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|r| r.id);
        out
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<AvailabilityRow>, StoreError> {
        Ok(query.finish(self.matching(&query.filter)))
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<AvailabilityRow>, StoreError> {
        Ok(self.matching(filter).into_iter().next())
    }

    async fn insert(&self, row: NewAvailabilityRow) -> Result<AvailabilityRow, StoreError> {
        let id = Ulid::new();
        let row = AvailabilityRow {
            id,
            member_id: row.member_id,
            match_id: row.match_id,
            event_id: row.event_id,
            status: row.status,
        };
        let key = row
            .occurrence_ref()
            .ok_or(StoreError::InvalidRow("exactly one of match_id / event_id must be set"))?;
        match self.unique.entry((row.member_id, key)) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation),
            Entry::Vacant(slot) => {
                slot.insert(id);
                self.rows.insert(id, row.clone());
                Ok(row)
            }
        }
    }

    async fn update_status(&self, id: Ulid, status: AvailabilityStatus) -> Result<(), StoreError> {
        let mut row = self.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        row.status = status.as_str().to_string();
        Ok(())
    }

    async fn delete_where(&self, filter: &Filter) -> Result<usize, StoreError> {
        let doomed = self.matching(filter);
        for row in &doomed {
            self.rows.remove(&row.id);
            if let Some(key) = row.occurrence_ref() {
                self.unique
                    .remove_if(&(row.member_id, key), |_, owner| *owner == row.id);
            }
        }
        Ok(doomed.len())
    }
}
