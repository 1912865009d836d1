use crate::model::*;

/// Number of members an occurrence needs.
///
/// Matches sum their line slots (a match-level `lines` override wins over
/// the team's config). Practices need the whole active roster. Every other
/// event or personal activity needs one responder.
pub fn required_responders(
    occurrence: &Occurrence,
    team_lines: Option<&LineConfig>,
    active_roster: usize,
) -> u32 {
    match occurrence {
        Occurrence::Match { lines, .. } => match lines.as_ref().or(team_lines) {
            Some(config) => line_responders(config),
            None => 0,
        },
        Occurrence::Event { .. } if occurrence.is_practice() => {
            u32::try_from(active_roster).unwrap_or(u32::MAX)
        }
        Occurrence::Event { .. } | Occurrence::PersonalActivity { .. } => 1,
    }
}

/// Members needed to fill every slot of a line-up.
///
/// The first `line_count` entries of `line_types` are used as given; slots
/// without a type count as doubles and extra types are ignored.
pub fn line_responders(config: &LineConfig) -> u32 {
    let typed = config
        .line_types
        .iter()
        .take(config.line_count as usize)
        .fold(0u32, |sum, slot| sum.saturating_add(slot.responders()));
    let untyped = config
        .line_count
        .saturating_sub(config.line_types.len().min(config.line_count as usize) as u32);
    typed.saturating_add(untyped.saturating_mul(MatchType::Doubles.responders()))
}
