use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

// ── Availability ─────────────────────────────────────────────────

/// A member's response to one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
    Maybe,
    LastResort,
}

impl AvailabilityStatus {
    pub const ALL: [AvailabilityStatus; 4] = [
        AvailabilityStatus::Available,
        AvailabilityStatus::Unavailable,
        AvailabilityStatus::Maybe,
        AvailabilityStatus::LastResort,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Unavailable => "unavailable",
            AvailabilityStatus::Maybe => "maybe",
            AvailabilityStatus::LastResort => "last_resort",
        }
    }

    /// Parse the stored string form. Exact match only.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One matrix cell. Non-responders are `Unset`, never `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Unset,
    Status(AvailabilityStatus),
}

// ── Occurrences ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    Match,
    Event,
    PersonalActivity,
}

impl OccurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceKind::Match => "match",
            OccurrenceKind::Event => "event",
            OccurrenceKind::PersonalActivity => "personal_activity",
        }
    }
}

/// Court format of one line slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Singles,
    Doubles,
    Mixed,
}

impl MatchType {
    /// Players needed to fill one slot of this type.
    pub fn responders(&self) -> u32 {
        match self {
            MatchType::Singles => 1,
            MatchType::Doubles | MatchType::Mixed => 2,
        }
    }
}

/// A team's (or a single match's) line-up format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    pub line_count: u32,
    /// Per-slot types. May be shorter or longer than `line_count`.
    #[serde(default)]
    pub line_types: Vec<MatchType>,
}

/// Category string that marks an event as a practice.
pub const PRACTICE_CATEGORY: &str = "practice";

/// One dated calendar item a member can respond to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Occurrence {
    Match {
        id: Ulid,
        date: NaiveDate,
        time: Option<NaiveTime>,
        team_id: Option<Ulid>,
        /// Overrides the team's line configuration for this match.
        lines: Option<LineConfig>,
    },
    Event {
        id: Ulid,
        date: NaiveDate,
        time: Option<NaiveTime>,
        team_id: Option<Ulid>,
        category: String,
    },
    PersonalActivity {
        id: Ulid,
        date: NaiveDate,
        time: Option<NaiveTime>,
        team_id: Option<Ulid>,
        owner_id: Option<Ulid>,
    },
}

impl Occurrence {
    pub fn id(&self) -> Ulid {
        match self {
            Occurrence::Match { id, .. }
            | Occurrence::Event { id, .. }
            | Occurrence::PersonalActivity { id, .. } => *id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Occurrence::Match { date, .. }
            | Occurrence::Event { date, .. }
            | Occurrence::PersonalActivity { date, .. } => *date,
        }
    }

    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            Occurrence::Match { time, .. }
            | Occurrence::Event { time, .. }
            | Occurrence::PersonalActivity { time, .. } => *time,
        }
    }

    pub fn team_id(&self) -> Option<Ulid> {
        match self {
            Occurrence::Match { team_id, .. }
            | Occurrence::Event { team_id, .. }
            | Occurrence::PersonalActivity { team_id, .. } => *team_id,
        }
    }

    pub fn kind(&self) -> OccurrenceKind {
        match self {
            Occurrence::Match { .. } => OccurrenceKind::Match,
            Occurrence::Event { .. } => OccurrenceKind::Event,
            Occurrence::PersonalActivity { .. } => OccurrenceKind::PersonalActivity,
        }
    }

    /// Which foreign key an availability row uses for this occurrence.
    pub fn occurrence_ref(&self) -> OccurrenceRef {
        match self {
            Occurrence::Match { id, .. } => OccurrenceRef::Match(*id),
            Occurrence::Event { id, .. } | Occurrence::PersonalActivity { id, .. } => {
                OccurrenceRef::Event(*id)
            }
        }
    }

    pub fn is_practice(&self) -> bool {
        matches!(self, Occurrence::Event { category, .. } if category.trim().eq_ignore_ascii_case(PRACTICE_CATEGORY))
    }

    /// Same occurrence with a new id and date. Used when expanding a series.
    pub fn with_id_and_date(&self, new_id: Ulid, new_date: NaiveDate) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Occurrence::Match { id, date, .. }
            | Occurrence::Event { id, date, .. }
            | Occurrence::PersonalActivity { id, date, .. } => {
                *id = new_id;
                *date = new_date;
            }
        }
        copy
    }
}

/// Normalized form of the two mutually exclusive foreign keys on an
/// availability row. Events and personal activities share the event key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceRef {
    Match(Ulid),
    Event(Ulid),
}

impl OccurrenceRef {
    pub fn id(&self) -> Ulid {
        match self {
            OccurrenceRef::Match(id) | OccurrenceRef::Event(id) => *id,
        }
    }
}

// ── Recurrence ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Custom {
        interval: u32,
        unit: TimeUnit,
        /// Recorded with the series but not applied during generation.
        #[serde(default)]
        weekdays: Vec<Weekday>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCondition {
    Until(NaiveDate),
    Count(u32),
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSeries {
    pub origin: NaiveDate,
    pub pattern: RecurrencePattern,
    pub end: EndCondition,
}

// ── Roster & records ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub id: Ulid,
    pub team_id: Ulid,
    pub active: bool,
    pub name: Option<String>,
}

/// A validated availability response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub id: Ulid,
    pub member_id: Ulid,
    pub occurrence: OccurrenceRef,
    pub status: AvailabilityStatus,
}

/// Availability row as persisted by the record store.
/// Exactly one of `match_id` / `event_id` is expected to be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRow {
    pub id: Ulid,
    pub member_id: Ulid,
    pub match_id: Option<Ulid>,
    pub event_id: Option<Ulid>,
    pub status: String,
}

impl AvailabilityRow {
    /// The row's occurrence key, or `None` when both or neither key is set.
    pub fn occurrence_ref(&self) -> Option<OccurrenceRef> {
        match (self.match_id, self.event_id) {
            (Some(id), None) => Some(OccurrenceRef::Match(id)),
            (None, Some(id)) => Some(OccurrenceRef::Event(id)),
            _ => None,
        }
    }
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAvailabilityRow {
    pub member_id: Ulid,
    pub match_id: Option<Ulid>,
    pub event_id: Option<Ulid>,
    pub status: String,
}

impl NewAvailabilityRow {
    pub fn new(member_id: Ulid, occurrence: OccurrenceRef, status: AvailabilityStatus) -> Self {
        let (match_id, event_id) = match occurrence {
            OccurrenceRef::Match(id) => (Some(id), None),
            OccurrenceRef::Event(id) => (None, Some(id)),
        };
        Self {
            member_id,
            match_id,
            event_id,
            status: status.as_str().to_string(),
        }
    }
}

// ── Staging ──────────────────────────────────────────────────────

/// Marker string that stages a delete.
pub const CLEAR_MARKER: &str = "clear";

/// Target of a staged edit. Unrecognized input is kept so it can be
/// reported at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedTarget {
    Status(AvailabilityStatus),
    Clear,
    Unrecognized(String),
}

impl StagedTarget {
    pub fn parse(raw: &str) -> Self {
        if raw == CLEAR_MARKER {
            return StagedTarget::Clear;
        }
        match AvailabilityStatus::parse(raw) {
            Some(status) => StagedTarget::Status(status),
            None => StagedTarget::Unrecognized(raw.to_string()),
        }
    }
}

impl From<AvailabilityStatus> for StagedTarget {
    fn from(status: AvailabilityStatus) -> Self {
        StagedTarget::Status(status)
    }
}

// ── View preferences ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Matrix,
    Summary,
}

/// Caller-owned view settings (selected team, filters, mode).
/// Passed into view selection and handed back, never stored globally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreferences {
    pub team_id: Option<Ulid>,
    /// Kinds to show. Empty means all kinds.
    #[serde(default)]
    pub kinds: Vec<OccurrenceKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub mode: ViewMode,
}
