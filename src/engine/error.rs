use ulid::Ulid;

use super::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed input caught before any store access.
    Validation(String),
    NotFound(Ulid),
    Permission {
        member: Option<Ulid>,
        team: Option<Ulid>,
    },
    Store(String),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation error: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Permission { member, team } => {
                let member = member.map_or("anonymous".to_string(), |m| m.to_string());
                match team {
                    Some(team) => write!(f, "permission denied: {member} cannot edit team {team}"),
                    None => write!(f, "permission denied: {member} cannot edit this occurrence"),
                }
            }
            EngineError::Store(e) => write!(f, "store error: {e}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e.to_string())
    }
}
