use ulid::Ulid;

use crate::model::{AvailabilityRow, OccurrenceRef};

/// Columns of an availability row that predicates can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    MemberId,
    MatchId,
    EventId,
    Status,
}

/// A column value. `Null` stands for an unset foreign key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Null,
    Id(Ulid),
    Text(String),
}

impl From<Ulid> for Value {
    fn from(id: Ulid) -> Self {
        Value::Id(id)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Option<Ulid>> for Value {
    fn from(id: Option<Ulid>) -> Self {
        id.map_or(Value::Null, Value::Id)
    }
}

/// Row predicate: equality, set membership, range, null checks, and
/// logical AND / OR.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(Field, Value),
    In(Field, Vec<Value>),
    /// Inclusive on both ends; `None` leaves that side open.
    Range {
        field: Field,
        min: Option<Value>,
        max: Option<Value>,
    },
    IsNull(Field),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: Field, value: impl Into<Value>) -> Self {
        Filter::Eq(field, value.into())
    }

    pub fn is_in<V: Into<Value>>(field: Field, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field, values.into_iter().map(Into::into).collect())
    }

    /// Rows for one (member, occurrence) pair, keyed on the right column.
    pub fn for_pair(member_id: Ulid, occurrence: OccurrenceRef) -> Self {
        let key = match occurrence {
            OccurrenceRef::Match(id) => Filter::eq(Field::MatchId, id),
            OccurrenceRef::Event(id) => Filter::eq(Field::EventId, id),
        };
        Filter::And(vec![Filter::eq(Field::MemberId, member_id), key])
    }

    pub fn matches(&self, row: &AvailabilityRow) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => field_value(row, *field) == *value,
            Filter::In(field, values) => {
                let v = field_value(row, *field);
                values.contains(&v)
            }
            Filter::Range { field, min, max } => {
                let v = field_value(row, *field);
                if v == Value::Null {
                    return false;
                }
                min.as_ref().is_none_or(|lo| v >= *lo) && max.as_ref().is_none_or(|hi| v <= *hi)
            }
            Filter::IsNull(field) => field_value(row, *field) == Value::Null,
            Filter::And(parts) => parts.iter().all(|f| f.matches(row)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(row)),
        }
    }
}

pub fn field_value(row: &AvailabilityRow, field: Field) -> Value {
    match field {
        Field::Id => Value::Id(row.id),
        Field::MemberId => Value::Id(row.member_id),
        Field::MatchId => row.match_id.into(),
        Field::EventId => row.event_id.into(),
        Field::Status => Value::Text(row.status.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Filtered read with optional ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order_by: Option<(Field, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            order_by: None,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: Field, direction: Direction) -> Self {
        self.order_by = Some((field, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply ordering and limit to already-filtered rows.
    pub fn finish(&self, mut rows: Vec<AvailabilityRow>) -> Vec<AvailabilityRow> {
        if let Some((field, direction)) = self.order_by {
            rows.sort_by(|a, b| {
                let ord = field_value(a, field).cmp(&field_value(b, field));
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
                .then_with(|| a.id.cmp(&b.id))
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new(Filter::All)
    }
}
