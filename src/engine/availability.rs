use std::collections::HashMap;

use serde::Serialize;
use ulid::Ulid;

use crate::model::*;

use super::capacity::required_responders;

// ── View types ───────────────────────────────────────────────────

/// Tally for one occurrence across all active members.
///
/// Members without a record count toward `unavailable` (and `no_response`)
/// even though their matrix cell is `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccurrenceCounts {
    pub occurrence_id: Ulid,
    pub available: u32,
    pub maybe: u32,
    pub last_resort: u32,
    /// `maybe` and `last_resort` merged into one bucket.
    pub maybe_combined: u32,
    /// Explicit `unavailable` records plus non-responders.
    pub unavailable: u32,
    pub no_response: u32,
    /// Active members in view.
    pub total: u32,
    pub required: u32,
}

impl OccurrenceCounts {
    /// Responders still missing to reach `required`.
    pub fn shortfall(&self) -> u32 {
        self.required.saturating_sub(self.available)
    }
}

/// Participation indicator: occurrences marked available out of all in view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemberHistory {
    pub member_id: Ulid,
    pub available: u32,
    pub total: u32,
}

/// Consolidated availability for a set of members and occurrences.
#[derive(Debug, Clone)]
pub struct AvailabilityView {
    members: Vec<RosterMember>,
    occurrences: Vec<Occurrence>,
    member_index: HashMap<Ulid, usize>,
    occurrence_index: HashMap<Ulid, usize>,
    /// `cells[member][occurrence]`
    cells: Vec<Vec<Cell>>,
    record_ids: HashMap<(Ulid, Ulid), Ulid>,
    pub per_occurrence: Vec<OccurrenceCounts>,
    pub per_member: Vec<MemberHistory>,
}

impl AvailabilityView {
    /// Active members, in input order.
    pub fn members(&self) -> &[RosterMember] {
        &self.members
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    pub fn member(&self, id: &Ulid) -> Option<&RosterMember> {
        self.member_index.get(id).map(|&i| &self.members[i])
    }

    pub fn occurrence(&self, id: &Ulid) -> Option<&Occurrence> {
        self.occurrence_index.get(id).map(|&i| &self.occurrences[i])
    }

    pub fn cell(&self, member_id: &Ulid, occurrence_id: &Ulid) -> Option<Cell> {
        let m = *self.member_index.get(member_id)?;
        let o = *self.occurrence_index.get(occurrence_id)?;
        Some(self.cells[m][o])
    }

    /// One member's row, ordered like `occurrences()`.
    pub fn row(&self, member_id: &Ulid) -> Option<&[Cell]> {
        self.member_index
            .get(member_id)
            .map(|&i| self.cells[i].as_slice())
    }

    /// Id of the record backing a cell, if any.
    pub fn record_id(&self, member_id: &Ulid, occurrence_id: &Ulid) -> Option<Ulid> {
        self.record_ids.get(&(*member_id, *occurrence_id)).copied()
    }

    pub fn counts(&self, occurrence_id: &Ulid) -> Option<&OccurrenceCounts> {
        self.occurrence_index
            .get(occurrence_id)
            .map(|&i| &self.per_occurrence[i])
    }

    pub fn history(&self, member_id: &Ulid) -> Option<&MemberHistory> {
        self.member_index
            .get(member_id)
            .map(|&i| &self.per_member[i])
    }
}

// ── Aggregator ───────────────────────────────────────────────────

/// The single place availability is counted. Holds team line-ups so each
/// occurrence summary carries its required responder count.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    team_lines: HashMap<Ulid, LineConfig>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_team_lines(mut self, team_id: Ulid, lines: LineConfig) -> Self {
        self.team_lines.insert(team_id, lines);
        self
    }

    pub fn team_lines(&self, team_id: &Ulid) -> Option<&LineConfig> {
        self.team_lines.get(team_id)
    }

    /// Build the matrix and summaries.
    ///
    /// Inactive members are dropped. When several records exist for one
    /// (member, occurrence) pair the first one wins. Records pointing at
    /// members or occurrences outside the view are ignored.
    pub fn build(
        &self,
        members: &[RosterMember],
        occurrences: &[Occurrence],
        records: &[AvailabilityRecord],
    ) -> AvailabilityView {
        let members: Vec<RosterMember> = members.iter().filter(|m| m.active).cloned().collect();
        let occurrences = occurrences.to_vec();

        let member_index: HashMap<Ulid, usize> =
            members.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
        let occurrence_index: HashMap<Ulid, usize> =
            occurrences.iter().enumerate().map(|(i, o)| (o.id(), i)).collect();
        let by_ref: HashMap<OccurrenceRef, usize> = occurrences
            .iter()
            .enumerate()
            .map(|(i, o)| (o.occurrence_ref(), i))
            .collect();

        let mut cells = vec![vec![Cell::Unset; occurrences.len()]; members.len()];
        let mut record_ids = HashMap::new();
        let mut duplicates = 0usize;

        for record in records {
            let (Some(&m), Some(&o)) = (
                member_index.get(&record.member_id),
                by_ref.get(&record.occurrence),
            ) else {
                continue;
            };
            if cells[m][o] != Cell::Unset {
                duplicates += 1;
                continue;
            }
            cells[m][o] = Cell::Status(record.status);
            record_ids.insert((record.member_id, occurrences[o].id()), record.id);
        }
        if duplicates > 0 {
            tracing::debug!(duplicates, "ignored duplicate availability records");
        }

        let total = members.len() as u32;
        let per_occurrence = occurrences
            .iter()
            .enumerate()
            .map(|(o, occurrence)| {
                let mut counts = OccurrenceCounts {
                    occurrence_id: occurrence.id(),
                    available: 0,
                    maybe: 0,
                    last_resort: 0,
                    maybe_combined: 0,
                    unavailable: 0,
                    no_response: 0,
                    total,
                    required: self.required_for(occurrence, &members),
                };
                for row in &cells {
                    match row[o] {
                        Cell::Status(AvailabilityStatus::Available) => counts.available += 1,
                        Cell::Status(AvailabilityStatus::Maybe) => counts.maybe += 1,
                        Cell::Status(AvailabilityStatus::LastResort) => counts.last_resort += 1,
                        Cell::Status(AvailabilityStatus::Unavailable) => counts.unavailable += 1,
                        Cell::Unset => {
                            counts.no_response += 1;
                            counts.unavailable += 1;
                        }
                    }
                }
                counts.maybe_combined = counts.maybe + counts.last_resort;
                counts
            })
            .collect();

        let per_member = members
            .iter()
            .zip(&cells)
            .map(|(member, row)| MemberHistory {
                member_id: member.id,
                available: row
                    .iter()
                    .filter(|c| **c == Cell::Status(AvailabilityStatus::Available))
                    .count() as u32,
                total: occurrences.len() as u32,
            })
            .collect();

        AvailabilityView {
            members,
            occurrences,
            member_index,
            occurrence_index,
            cells,
            record_ids,
            per_occurrence,
            per_member,
        }
    }

    fn required_for(&self, occurrence: &Occurrence, active: &[RosterMember]) -> u32 {
        let team = occurrence.team_id();
        let roster = match team {
            Some(team) => active.iter().filter(|m| m.team_id == team).count(),
            None => active.len(),
        };
        required_responders(occurrence, team.and_then(|t| self.team_lines.get(&t)), roster)
    }
}

// ── View selection ───────────────────────────────────────────────

/// Apply caller preferences: team, kinds, and date window. Occurrences come
/// back in chronological order. The normalized preferences are returned so
/// the caller can keep them for the next call.
pub fn select_view(
    prefs: ViewPreferences,
    members: &[RosterMember],
    occurrences: &[Occurrence],
) -> (Vec<RosterMember>, Vec<Occurrence>, ViewPreferences) {
    let mut prefs = prefs;
    if let (Some(from), Some(to)) = (prefs.from, prefs.to)
        && from > to
    {
        prefs.from = Some(to);
        prefs.to = Some(from);
    }
    prefs.kinds.sort_by_key(|k| k.as_str());
    prefs.kinds.dedup();

    let members: Vec<RosterMember> = members
        .iter()
        .filter(|m| prefs.team_id.is_none_or(|t| m.team_id == t))
        .cloned()
        .collect();

    let mut selected: Vec<Occurrence> = occurrences
        .iter()
        .filter(|o| prefs.team_id.is_none_or(|t| o.team_id() == Some(t)))
        .filter(|o| prefs.kinds.is_empty() || prefs.kinds.contains(&o.kind()))
        .filter(|o| prefs.from.is_none_or(|from| o.date() >= from))
        .filter(|o| prefs.to.is_none_or(|to| o.date() <= to))
        .cloned()
        .collect();
    selected.sort_by_key(|o| (o.date(), o.time()));

    (members, selected, prefs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn member(team: Ulid) -> RosterMember {
        RosterMember {
            id: Ulid::new(),
            team_id: team,
            active: true,
            name: None,
        }
    }

    fn a_match(team: Ulid, day: u32) -> Occurrence {
        Occurrence::Match {
            id: Ulid::new(),
            date: d(day),
            time: None,
            team_id: Some(team),
            lines: None,
        }
    }

    fn practice(team: Ulid, day: u32) -> Occurrence {
        Occurrence::Event {
            id: Ulid::new(),
            date: d(day),
            time: None,
            team_id: Some(team),
            category: "practice".into(),
        }
    }

    fn record(member: &RosterMember, occ: &Occurrence, status: AvailabilityStatus) -> AvailabilityRecord {
        AvailabilityRecord {
            id: Ulid::new(),
            member_id: member.id,
            occurrence: occ.occurrence_ref(),
            status,
        }
    }

    #[test]
    fn non_responders_count_unavailable_but_display_unset() {
        let team = Ulid::new();
        let members: Vec<RosterMember> = (0..4).map(|_| member(team)).collect();
        let occ = a_match(team, 1);
        let records = vec![
            record(&members[0], &occ, AvailabilityStatus::Available),
            record(&members[1], &occ, AvailabilityStatus::Available),
        ];
        let view = Aggregator::new().build(&members, std::slice::from_ref(&occ), &records);

        let counts = view.counts(&occ.id()).unwrap();
        assert_eq!(counts.available, 2);
        assert_eq!(counts.maybe_combined, 0);
        assert_eq!(counts.unavailable, 2);
        assert_eq!(counts.no_response, 2);
        assert_eq!(counts.total, 4);

        assert_eq!(view.cell(&members[2].id, &occ.id()), Some(Cell::Unset));
        assert_eq!(view.cell(&members[3].id, &occ.id()), Some(Cell::Unset));
        assert_eq!(
            view.cell(&members[0].id, &occ.id()),
            Some(Cell::Status(AvailabilityStatus::Available))
        );
    }

    #[test]
    fn maybe_and_last_resort_are_separate_and_combined() {
        let team = Ulid::new();
        let members: Vec<RosterMember> = (0..3).map(|_| member(team)).collect();
        let occ = practice(team, 2);
        let records = vec![
            record(&members[0], &occ, AvailabilityStatus::Maybe),
            record(&members[1], &occ, AvailabilityStatus::LastResort),
            record(&members[2], &occ, AvailabilityStatus::Unavailable),
        ];
        let view = Aggregator::new().build(&members, std::slice::from_ref(&occ), &records);
        let counts = view.counts(&occ.id()).unwrap();
        assert_eq!(counts.maybe, 1);
        assert_eq!(counts.last_resort, 1);
        assert_eq!(counts.maybe_combined, 2);
        assert_eq!(counts.unavailable, 1);
        assert_eq!(counts.no_response, 0);
        assert_eq!(counts.required, 3);
        assert_eq!(counts.shortfall(), 3);
    }

    #[test]
    fn serialized_counts_carry_combined_maybe() {
        let team = Ulid::new();
        let members: Vec<RosterMember> = (0..2).map(|_| member(team)).collect();
        let occ = a_match(team, 3);
        let records = vec![
            record(&members[0], &occ, AvailabilityStatus::Maybe),
            record(&members[1], &occ, AvailabilityStatus::LastResort),
        ];
        let view = Aggregator::new().build(&members, std::slice::from_ref(&occ), &records);
        let json = serde_json::to_value(view.counts(&occ.id()).unwrap()).unwrap();
        assert_eq!(json["maybe_combined"], 2);
        assert_eq!(json["maybe"], 1);
        assert_eq!(json["last_resort"], 1);
    }

    #[test]
    fn first_record_wins() {
        let team = Ulid::new();
        let m = member(team);
        let occ = a_match(team, 1);
        let first = record(&m, &occ, AvailabilityStatus::Maybe);
        let second = record(&m, &occ, AvailabilityStatus::Available);
        let view = Aggregator::new().build(std::slice::from_ref(&m), std::slice::from_ref(&occ), &[first, second]);
        assert_eq!(view.cell(&m.id, &occ.id()), Some(Cell::Status(AvailabilityStatus::Maybe)));
        assert_eq!(view.record_id(&m.id, &occ.id()), Some(first.id));
        assert_eq!(view.counts(&occ.id()).unwrap().available, 0);
    }

    #[test]
    fn inactive_members_are_excluded() {
        let team = Ulid::new();
        let active = member(team);
        let mut benched = member(team);
        benched.active = false;
        let occ = practice(team, 3);
        let records = vec![record(&benched, &occ, AvailabilityStatus::Available)];
        let view = Aggregator::new().build(&[active.clone(), benched.clone()], std::slice::from_ref(&occ), &records);
        assert_eq!(view.members().len(), 1);
        assert!(view.row(&benched.id).is_none());
        let counts = view.counts(&occ.id()).unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.available, 0);
        assert_eq!(counts.required, 1);
    }

    #[test]
    fn record_keys_do_not_cross_kinds() {
        let team = Ulid::new();
        let m = member(team);
        let occ = a_match(team, 1);
        let wrong_key = AvailabilityRecord {
            id: Ulid::new(),
            member_id: m.id,
            occurrence: OccurrenceRef::Event(occ.id()),
            status: AvailabilityStatus::Available,
        };
        let view = Aggregator::new().build(std::slice::from_ref(&m), std::slice::from_ref(&occ), &[wrong_key]);
        assert_eq!(view.cell(&m.id, &occ.id()), Some(Cell::Unset));
    }

    #[test]
    fn member_history_counts_available() {
        let team = Ulid::new();
        let m = member(team);
        let occs = vec![a_match(team, 1), a_match(team, 8), practice(team, 4)];
        let records = vec![
            record(&m, &occs[0], AvailabilityStatus::Available),
            record(&m, &occs[1], AvailabilityStatus::Maybe),
            record(&m, &occs[2], AvailabilityStatus::Available),
        ];
        let view = Aggregator::new().build(std::slice::from_ref(&m), &occs, &records);
        let history = view.history(&m.id).unwrap();
        assert_eq!(history.available, 2);
        assert_eq!(history.total, 3);
    }

    #[test]
    fn empty_inputs_are_fine() {
        let team = Ulid::new();
        let occ = a_match(team, 1);
        let view = Aggregator::new().build(&[], std::slice::from_ref(&occ), &[]);
        let counts = view.counts(&occ.id()).unwrap();
        assert_eq!((counts.available, counts.unavailable, counts.total), (0, 0, 0));

        let m = member(team);
        let view = Aggregator::new().build(std::slice::from_ref(&m), &[], &[]);
        assert_eq!(view.row(&m.id), Some(&[][..]));
        assert_eq!(view.history(&m.id).unwrap().total, 0);
    }

    #[test]
    fn required_uses_team_lines() {
        let team = Ulid::new();
        let members: Vec<RosterMember> = (0..3).map(|_| member(team)).collect();
        let occ = a_match(team, 1);
        let records = vec![record(&members[0], &occ, AvailabilityStatus::Available)];
        let aggregator = Aggregator::new().with_team_lines(
            team,
            LineConfig {
                line_count: 2,
                line_types: vec![MatchType::Singles],
            },
        );
        let view = aggregator.build(&members, std::slice::from_ref(&occ), &records);
        let counts = view.counts(&occ.id()).unwrap();
        assert_eq!(counts.required, 3);
        assert_eq!(counts.shortfall(), 2);
    }

    #[test]
    fn select_view_filters_and_sorts() {
        let team = Ulid::new();
        let other = Ulid::new();
        let members = vec![member(team), member(other)];
        let late = a_match(team, 20);
        let early = practice(team, 5);
        let elsewhere = a_match(other, 6);
        let prefs = ViewPreferences {
            team_id: Some(team),
            from: Some(d(30)),
            to: Some(d(1)),
            ..Default::default()
        };
        let (ms, os, prefs) = select_view(prefs, &members, &[late.clone(), elsewhere, early.clone()]);
        assert_eq!(ms.len(), 1);
        assert_eq!(os, vec![early.clone(), late]);
        assert_eq!((prefs.from, prefs.to), (Some(d(1)), Some(d(30))));

        let prefs = ViewPreferences {
            kinds: vec![OccurrenceKind::Event, OccurrenceKind::Event],
            ..prefs
        };
        let (_, os, prefs) = select_view(prefs, &members, &[a_match(team, 2), early.clone()]);
        assert_eq!(os, vec![early]);
        assert_eq!(prefs.kinds, vec![OccurrenceKind::Event]);
    }
}
