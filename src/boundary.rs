//! Conversion from loosely-typed store data into engine types. Everything
//! read from the store passes through here exactly once.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use ulid::Ulid;

use crate::engine::{EngineError, RecordStore};
use crate::model::*;
use crate::query::{Direction, Field, Filter, Query};

#[derive(Debug, Deserialize)]
struct OccurrenceRow {
    id: Ulid,
    kind: Option<String>,
    date: NaiveDate,
    time: Option<String>,
    team_id: Option<Ulid>,
    category: Option<String>,
    owner_id: Option<Ulid>,
    line_count: Option<u32>,
    line_types: Option<Vec<MatchType>>,
}

/// Validate one occurrence row into the tagged `Occurrence` form.
///
/// `kind` must be `match`, `event` or `personal_activity`; `time` accepts
/// `HH:MM` and `HH:MM:SS`.
pub fn occurrence_from_json(value: &serde_json::Value) -> Result<Occurrence, EngineError> {
    let row: OccurrenceRow = serde_json::from_value(value.clone())
        .map_err(|e| EngineError::Validation(format!("malformed occurrence row: {e}")))?;
    let time = row.time.as_deref().map(parse_time).transpose()?;

    match row.kind.as_deref() {
        Some("match") => Ok(Occurrence::Match {
            id: row.id,
            date: row.date,
            time,
            team_id: row.team_id,
            lines: row.line_count.map(|line_count| LineConfig {
                line_count,
                line_types: row.line_types.unwrap_or_default(),
            }),
        }),
        Some("event") => Ok(Occurrence::Event {
            id: row.id,
            date: row.date,
            time,
            team_id: row.team_id,
            category: row.category.unwrap_or_default(),
        }),
        Some("personal_activity") => Ok(Occurrence::PersonalActivity {
            id: row.id,
            date: row.date,
            time,
            team_id: row.team_id,
            owner_id: row.owner_id,
        }),
        Some(other) => Err(EngineError::Validation(format!(
            "unknown occurrence kind: {other}"
        ))),
        None => Err(EngineError::Validation("occurrence row has no kind".into())),
    }
}

/// Validate a batch of rows, dropping (and logging) the ones that fail.
pub fn occurrences_from_json(values: &[serde_json::Value]) -> Vec<Occurrence> {
    values
        .iter()
        .filter_map(|v| match occurrence_from_json(v) {
            Ok(occurrence) => Some(occurrence),
            Err(e) => {
                tracing::warn!("skipping occurrence row: {e}");
                metrics::counter!(crate::observability::RECORDS_SKIPPED_TOTAL).increment(1);
                None
            }
        })
        .collect()
}

fn parse_time(raw: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| EngineError::Validation(format!("invalid time: {raw}")))
}

/// Check the dual-key shape and status of a stored row.
pub fn record_from_row(row: &AvailabilityRow) -> Result<AvailabilityRecord, EngineError> {
    let occurrence = row.occurrence_ref().ok_or_else(|| {
        EngineError::Validation(format!(
            "row {} must reference exactly one of match_id / event_id",
            row.id
        ))
    })?;
    let status = AvailabilityStatus::parse(&row.status).ok_or_else(|| {
        EngineError::Validation(format!("row {} has unknown status {:?}", row.id, row.status))
    })?;
    Ok(AvailabilityRecord {
        id: row.id,
        member_id: row.member_id,
        occurrence,
        status,
    })
}

/// Fetch every record for the given members and occurrences in one read,
/// ordered by record id so de-duplication downstream is deterministic.
/// Invalid rows are skipped with a warning.
pub async fn load_records<S: RecordStore + ?Sized>(
    store: &S,
    members: &[RosterMember],
    occurrences: &[Occurrence],
) -> Result<Vec<AvailabilityRecord>, EngineError> {
    if members.is_empty() || occurrences.is_empty() {
        return Ok(Vec::new());
    }

    let mut match_ids = Vec::new();
    let mut event_ids = Vec::new();
    for occurrence in occurrences {
        match occurrence.occurrence_ref() {
            OccurrenceRef::Match(id) => match_ids.push(id),
            OccurrenceRef::Event(id) => event_ids.push(id),
        }
    }
    let mut keys = Vec::new();
    if !match_ids.is_empty() {
        keys.push(Filter::is_in(Field::MatchId, match_ids));
    }
    if !event_ids.is_empty() {
        keys.push(Filter::is_in(Field::EventId, event_ids));
    }

    let filter = Filter::And(vec![
        Filter::is_in(Field::MemberId, members.iter().map(|m| m.id)),
        Filter::Or(keys),
    ]);
    let rows = store
        .select(&Query::new(filter).order_by(Field::Id, Direction::Asc))
        .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        match record_from_row(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("skipping availability row: {e}");
                metrics::counter!(crate::observability::RECORDS_SKIPPED_TOTAL).increment(1);
            }
        }
    }
    tracing::debug!(
        rows = rows.len(),
        records = records.len(),
        "loaded availability records"
    );
    Ok(records)
}
