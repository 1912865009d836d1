use chrono::{Days, Months, NaiveDate};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Expand a recurrence rule into its occurrence dates.
///
/// The result is strictly increasing and always starts with `origin`.
///
/// - `Daily` / `Weekly` step by 1 / 7 days.
/// - `Custom` steps by `interval` units from the previously emitted date.
///   Month and year steps clamp to the last valid day of the target month
///   (chrono `checked_add_months`), so Jan 31 + 1 month is Feb 29 in a leap
///   year and the following step continues from the 29th.
/// - A custom weekday set is carried on the series but does not change the
///   step or add dates within an interval.
/// - `Until(end)` stops before the first date past `end`. `Count(n)` emits
///   `n` dates (at least one). `Unbounded` stops at origin + 24 months.
///
/// At most `MAX_RECURRENCE_STEPS` dates are produced; longer series are
/// truncated without error.
pub fn generate(
    origin: NaiveDate,
    pattern: &RecurrencePattern,
    end: &EndCondition,
) -> Result<Vec<NaiveDate>, EngineError> {
    let (interval, unit) = match pattern {
        RecurrencePattern::Daily => (1, TimeUnit::Day),
        RecurrencePattern::Weekly => (1, TimeUnit::Week),
        RecurrencePattern::Custom { interval, unit, weekdays } => {
            if *interval == 0 {
                return Err(EngineError::Validation(
                    "recurrence interval must be at least 1".into(),
                ));
            }
            if !weekdays.is_empty() {
                tracing::debug!(
                    ?weekdays,
                    "custom recurrence weekday set is not applied to date generation"
                );
            }
            (*interval, *unit)
        }
    };

    let horizon = match end {
        EndCondition::Until(last) => Some(*last),
        EndCondition::Count(_) => None,
        EndCondition::Unbounded => Some(
            origin
                .checked_add_months(Months::new(UNBOUNDED_HORIZON_MONTHS))
                .unwrap_or(NaiveDate::MAX),
        ),
    };
    let wanted = match end {
        EndCondition::Count(n) => (*n as usize).clamp(1, MAX_RECURRENCE_STEPS),
        _ => MAX_RECURRENCE_STEPS,
    };

    let mut dates = vec![origin];
    let mut current = origin;
    while dates.len() < wanted {
        let Some(next) = advance(current, interval, unit) else {
            break;
        };
        if horizon.is_some_and(|h| next > h) {
            break;
        }
        dates.push(next);
        current = next;
    }

    let truncated = dates.len() == MAX_RECURRENCE_STEPS
        && match end {
            EndCondition::Count(n) => *n as usize > MAX_RECURRENCE_STEPS,
            _ => true,
        };
    if truncated {
        metrics::counter!(crate::observability::SERIES_TRUNCATED_TOTAL).increment(1);
        tracing::debug!(%origin, "recurrence series truncated at {MAX_RECURRENCE_STEPS} dates");
    }

    Ok(dates)
}

/// One step forward. `None` when the date would leave chrono's range.
fn advance(from: NaiveDate, interval: u32, unit: TimeUnit) -> Option<NaiveDate> {
    match unit {
        TimeUnit::Day => from.checked_add_days(Days::new(interval as u64)),
        TimeUnit::Week => from.checked_add_days(Days::new(interval as u64 * 7)),
        TimeUnit::Month => from.checked_add_months(Months::new(interval)),
        TimeUnit::Year => from.checked_add_months(Months::new(interval.checked_mul(12)?)),
    }
}

impl RecurrenceSeries {
    pub fn dates(&self) -> Result<Vec<NaiveDate>, EngineError> {
        generate(self.origin, &self.pattern, &self.end)
    }

    /// Materialize the series as occurrences copied from `template`.
    /// The first occurrence keeps the template's id; later ones get fresh ids.
    pub fn expand(&self, template: &Occurrence) -> Result<Vec<Occurrence>, EngineError> {
        let dates = self.dates()?;
        Ok(dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| {
                let id = if i == 0 { template.id() } else { Ulid::new() };
                template.with_id_and_date(id, date)
            })
            .collect())
    }
}
