use std::collections::HashSet;

use ulid::Ulid;

/// Who is acting, and which teams they may edit (captain / co-captain).
pub trait IdentityProvider: Send + Sync {
    fn acting_member(&self) -> Option<Ulid>;

    fn can_edit(&self, team_id: Ulid) -> bool;
}

/// Fixed identity, for embedding hosts that resolve the session up front.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    member: Option<Ulid>,
    captain_of: HashSet<Ulid>,
}

impl StaticIdentity {
    pub fn new(member: Ulid) -> Self {
        Self {
            member: Some(member),
            captain_of: HashSet::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn captain_of(mut self, team_id: Ulid) -> Self {
        self.captain_of.insert(team_id);
        self
    }
}

impl IdentityProvider for StaticIdentity {
    fn acting_member(&self) -> Option<Ulid> {
        self.member
    }

    fn can_edit(&self, team_id: Ulid) -> bool {
        self.member.is_some() && self.captain_of.contains(&team_id)
    }
}
