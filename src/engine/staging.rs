use std::collections::{BTreeMap, HashMap};

use ulid::Ulid;

use crate::config::CommitConfig;
use crate::identity::IdentityProvider;
use crate::model::*;

use super::availability::AvailabilityView;
use super::EngineError;

/// One pending edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    pub member_id: Ulid,
    pub occurrence_id: Ulid,
    pub target: StagedTarget,
}

/// A captain's edit session: a working set of members and occurrences
/// plus the edits staged against it. Nothing touches the store until
/// `commit`.
#[derive(Debug, Clone)]
pub struct StagingSession {
    pub(super) members: HashMap<Ulid, RosterMember>,
    pub(super) occurrences: HashMap<Ulid, Occurrence>,
    member_order: Vec<Ulid>,
    occurrence_order: Vec<Ulid>,
    pub(super) staged: BTreeMap<(Ulid, Ulid), StagedTarget>,
    pub(super) config: CommitConfig,
}

impl StagingSession {
    pub fn new(members: &[RosterMember], occurrences: &[Occurrence], config: CommitConfig) -> Self {
        let mut session = Self {
            members: HashMap::new(),
            occurrences: HashMap::new(),
            member_order: Vec::new(),
            occurrence_order: Vec::new(),
            staged: BTreeMap::new(),
            config: config.clamped(),
        };
        session.replace_working_set(members, occurrences);
        session
    }

    /// Session over the members and occurrences currently in view.
    pub fn from_view(view: &AvailabilityView, config: CommitConfig) -> Self {
        Self::new(view.members(), view.occurrences(), config)
    }

    /// Swap in a refreshed view. Staged edits are kept; edits whose member
    /// or occurrence disappeared fail with `NotFound` on the next commit.
    pub fn refresh(&mut self, view: &AvailabilityView) {
        self.replace_working_set(view.members(), view.occurrences());
    }

    fn replace_working_set(&mut self, members: &[RosterMember], occurrences: &[Occurrence]) {
        let active = members.iter().filter(|m| m.active);
        self.member_order = active.clone().map(|m| m.id).collect();
        self.members = active.map(|m| (m.id, m.clone())).collect();
        self.occurrence_order = occurrences.iter().map(|o| o.id()).collect();
        self.occurrences = occurrences.iter().map(|o| (o.id(), o.clone())).collect();
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn get(&self, member_id: &Ulid, occurrence_id: &Ulid) -> Option<&StagedTarget> {
        self.staged.get(&(*member_id, *occurrence_id))
    }

    /// Staged edits ordered by (member, occurrence).
    pub fn staged(&self) -> Vec<StagedChange> {
        self.staged
            .iter()
            .map(|(&(member_id, occurrence_id), target)| StagedChange {
                member_id,
                occurrence_id,
                target: target.clone(),
            })
            .collect()
    }

    /// Stage one cell. Re-staging a cell replaces the previous target.
    pub fn stage(
        &mut self,
        identity: &dyn IdentityProvider,
        member_id: Ulid,
        occurrence_id: Ulid,
        target: impl Into<StagedTarget>,
    ) -> Result<(), EngineError> {
        self.check_cell(identity, member_id, occurrence_id)?;
        self.check_room(1, std::iter::once((member_id, occurrence_id)))?;
        self.staged.insert((member_id, occurrence_id), target.into());
        Ok(())
    }

    /// Stage the same target for every occurrence of one member.
    /// All-or-nothing: one refused cell refuses the row.
    pub fn stage_row(
        &mut self,
        identity: &dyn IdentityProvider,
        member_id: Ulid,
        target: impl Into<StagedTarget>,
    ) -> Result<usize, EngineError> {
        let cells: Vec<(Ulid, Ulid)> = self
            .occurrence_order
            .iter()
            .map(|&occurrence_id| (member_id, occurrence_id))
            .collect();
        if !self.members.contains_key(&member_id) {
            return Err(EngineError::NotFound(member_id));
        }
        self.stage_cells(identity, cells, target.into())
    }

    /// Stage the same target for every active member on one occurrence.
    /// For a team occurrence only that team's members are covered.
    pub fn stage_column(
        &mut self,
        identity: &dyn IdentityProvider,
        occurrence_id: Ulid,
        target: impl Into<StagedTarget>,
    ) -> Result<usize, EngineError> {
        let team = self
            .occurrences
            .get(&occurrence_id)
            .ok_or(EngineError::NotFound(occurrence_id))?
            .team_id();
        let cells: Vec<(Ulid, Ulid)> = self
            .member_order
            .iter()
            .filter(|id| team.is_none_or(|t| self.members.get(*id).is_some_and(|m| m.team_id == t)))
            .map(|&member_id| (member_id, occurrence_id))
            .collect();
        self.stage_cells(identity, cells, target.into())
    }

    fn stage_cells(
        &mut self,
        identity: &dyn IdentityProvider,
        cells: Vec<(Ulid, Ulid)>,
        target: StagedTarget,
    ) -> Result<usize, EngineError> {
        for &(member_id, occurrence_id) in &cells {
            self.check_cell(identity, member_id, occurrence_id)?;
        }
        self.check_room(cells.len(), cells.iter().copied())?;
        let count = cells.len();
        for key in cells {
            self.staged.insert(key, target.clone());
        }
        Ok(count)
    }

    pub fn discard(&mut self, member_id: &Ulid, occurrence_id: &Ulid) -> Option<StagedTarget> {
        self.staged.remove(&(*member_id, *occurrence_id))
    }

    pub fn discard_all(&mut self) {
        self.staged.clear();
    }

    fn check_cell(
        &self,
        identity: &dyn IdentityProvider,
        member_id: Ulid,
        occurrence_id: Ulid,
    ) -> Result<(), EngineError> {
        if !self.members.contains_key(&member_id) {
            return Err(EngineError::NotFound(member_id));
        }
        let occurrence = self
            .occurrences
            .get(&occurrence_id)
            .ok_or(EngineError::NotFound(occurrence_id))?;
        self.check_permission(identity, occurrence, member_id)
    }

    /// Team occurrences need captain rights on that team, and the member
    /// must be on that team's roster. Team-less occurrences may only be
    /// edited by the member they belong to. A member no longer in the
    /// working set is left for commit to report as `NotFound`.
    pub(super) fn check_permission(
        &self,
        identity: &dyn IdentityProvider,
        occurrence: &Occurrence,
        member_id: Ulid,
    ) -> Result<(), EngineError> {
        let acting = identity.acting_member();
        let allowed = match occurrence.team_id() {
            Some(team) => {
                acting.is_some()
                    && identity.can_edit(team)
                    && self
                        .members
                        .get(&member_id)
                        .is_none_or(|member| member.team_id == team)
            }
            None => acting == Some(member_id),
        };
        if allowed {
            Ok(())
        } else {
            Err(EngineError::Permission {
                member: acting,
                team: occurrence.team_id(),
            })
        }
    }

    fn check_room(
        &self,
        adding: usize,
        keys: impl Iterator<Item = (Ulid, Ulid)>,
    ) -> Result<(), EngineError> {
        let replacing = keys.filter(|k| self.staged.contains_key(k)).count();
        if self.staged.len() + adding - replacing > self.config.max_staged {
            return Err(EngineError::LimitExceeded("too many staged changes"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use chrono::NaiveDate;

    struct Fixture {
        team: Ulid,
        members: Vec<RosterMember>,
        occurrences: Vec<Occurrence>,
    }

    fn fixture() -> Fixture {
        let team = Ulid::new();
        let members = (0..3)
            .map(|_| RosterMember {
                id: Ulid::new(),
                team_id: team,
                active: true,
                name: None,
            })
            .collect();
        let occurrences = (1..=2)
            .map(|day| Occurrence::Match {
                id: Ulid::new(),
                date: NaiveDate::from_ymd_opt(2024, 7, day).unwrap(),
                time: None,
                team_id: Some(team),
                lines: None,
            })
            .collect();
        Fixture {
            team,
            members,
            occurrences,
        }
    }

    fn captain(f: &Fixture) -> StaticIdentity {
        StaticIdentity::new(f.members[0].id).captain_of(f.team)
    }

    #[test]
    fn stage_replaces_previous_target() {
        let f = fixture();
        let mut session = StagingSession::new(&f.members, &f.occurrences, CommitConfig::default());
        let who = captain(&f);
        let (m, o) = (f.members[1].id, f.occurrences[0].id());
        session.stage(&who, m, o, AvailabilityStatus::Maybe).unwrap();
        session.stage(&who, m, o, StagedTarget::Clear).unwrap();
        assert_eq!(session.len(), 1);
        assert_eq!(session.get(&m, &o), Some(&StagedTarget::Clear));
    }

    #[test]
    fn non_captain_is_refused() {
        let f = fixture();
        let mut session = StagingSession::new(&f.members, &f.occurrences, CommitConfig::default());
        let player = StaticIdentity::new(f.members[1].id);
        let result = session.stage(&player, f.members[1].id, f.occurrences[0].id(), AvailabilityStatus::Available);
        assert!(matches!(result, Err(EngineError::Permission { team: Some(t), .. }) if t == f.team));
        assert!(session.is_empty());
    }

    #[test]
    fn teamless_occurrence_is_self_service() {
        let f = fixture();
        let me = f.members[2].id;
        let personal = Occurrence::PersonalActivity {
            id: Ulid::new(),
            date: NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            time: None,
            team_id: None,
            owner_id: Some(me),
        };
        let mut session = StagingSession::new(&f.members, std::slice::from_ref(&personal), CommitConfig::default());
        let myself = StaticIdentity::new(me);
        session.stage(&myself, me, personal.id(), AvailabilityStatus::Unavailable).unwrap();
        let other = session.stage(&myself, f.members[0].id, personal.id(), AvailabilityStatus::Unavailable);
        assert!(matches!(other, Err(EngineError::Permission { .. })));
    }

    #[test]
    fn captain_cannot_edit_other_teams_members() {
        let f = fixture();
        let outsider = RosterMember {
            id: Ulid::new(),
            team_id: Ulid::new(),
            active: true,
            name: None,
        };
        let mut members = f.members.clone();
        members.push(outsider.clone());
        let mut session = StagingSession::new(&members, &f.occurrences, CommitConfig::default());
        let who = captain(&f);

        let result = session.stage(&who, outsider.id, f.occurrences[0].id(), AvailabilityStatus::Available);
        assert!(matches!(result, Err(EngineError::Permission { team: Some(t), .. }) if t == f.team));
        assert!(session.stage_row(&who, outsider.id, AvailabilityStatus::Maybe).is_err());
        assert!(session.is_empty());

        let column = session.stage_column(&who, f.occurrences[0].id(), AvailabilityStatus::Maybe).unwrap();
        assert_eq!(column, 3);
        assert!(session.get(&outsider.id, &f.occurrences[0].id()).is_none());
    }

    #[test]
    fn unknown_cells_are_not_found() {
        let f = fixture();
        let mut session = StagingSession::new(&f.members, &f.occurrences, CommitConfig::default());
        let who = captain(&f);
        let ghost = Ulid::new();
        assert_eq!(
            session.stage(&who, ghost, f.occurrences[0].id(), AvailabilityStatus::Maybe),
            Err(EngineError::NotFound(ghost))
        );
        assert_eq!(
            session.stage_column(&who, ghost, AvailabilityStatus::Maybe),
            Err(EngineError::NotFound(ghost))
        );
    }

    #[test]
    fn unrecognized_status_is_staged_for_commit_to_reject() {
        let f = fixture();
        let mut session = StagingSession::new(&f.members, &f.occurrences, CommitConfig::default());
        let who = captain(&f);
        session
            .stage(&who, f.members[0].id, f.occurrences[0].id(), StagedTarget::parse("bogus"))
            .unwrap();
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn row_and_column_bulk_staging() {
        let f = fixture();
        let mut session = StagingSession::new(&f.members, &f.occurrences, CommitConfig::default());
        let who = captain(&f);
        let row = session.stage_row(&who, f.members[1].id, AvailabilityStatus::Unavailable).unwrap();
        assert_eq!(row, 2);
        let column = session.stage_column(&who, f.occurrences[0].id(), AvailabilityStatus::Available).unwrap();
        assert_eq!(column, 3);
        // (member 1, occurrence 0) was restaged by the column.
        assert_eq!(session.len(), 4);
        assert_eq!(
            session.get(&f.members[1].id, &f.occurrences[0].id()),
            Some(&StagedTarget::Status(AvailabilityStatus::Available))
        );
    }

    #[test]
    fn inactive_members_are_outside_the_working_set() {
        let mut f = fixture();
        f.members[2].active = false;
        let mut session = StagingSession::new(&f.members, &f.occurrences, CommitConfig::default());
        let who = captain(&f);
        let staged = session.stage_column(&who, f.occurrences[1].id(), AvailabilityStatus::Maybe).unwrap();
        assert_eq!(staged, 2);
    }

    #[test]
    fn staged_limit_is_enforced() {
        let f = fixture();
        let config = CommitConfig {
            concurrency: 1,
            max_staged: 2,
        };
        let mut session = StagingSession::new(&f.members, &f.occurrences, config);
        let who = captain(&f);
        let result = session.stage_column(&who, f.occurrences[0].id(), AvailabilityStatus::Maybe);
        assert_eq!(result, Err(EngineError::LimitExceeded("too many staged changes")));
        assert!(session.is_empty());

        session.stage_row(&who, f.members[0].id, AvailabilityStatus::Maybe).unwrap();
        // Restaging existing cells does not count against the limit.
        session.stage_row(&who, f.members[0].id, AvailabilityStatus::Available).unwrap();
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn discard() {
        let f = fixture();
        let mut session = StagingSession::new(&f.members, &f.occurrences, CommitConfig::default());
        let who = captain(&f);
        session.stage_row(&who, f.members[0].id, AvailabilityStatus::Maybe).unwrap();
        assert!(session.discard(&f.members[0].id, &f.occurrences[0].id()).is_some());
        assert_eq!(session.len(), 1);
        session.discard_all();
        assert!(session.is_empty());
    }
}
