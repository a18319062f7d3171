use anyhow::{bail, Result};

use crate::event::types::Team;
use crate::standings::CombinedStanding;

/// Stable team id derived from the team's position in the name list
pub fn team_id(index: usize) -> String {
    format!("team-{}", index + 1)
}

/// Deal ranked pilots into teams.
///
/// Pilot `i` of the standings joins team `i % N`, so every team receives one
/// pilot per full round and a short last round fills the first teams in
/// order. Team ids follow the order of `names`.
pub fn deal_teams(standings: &[CombinedStanding], names: &[String]) -> Result<Vec<Team>> {
    if names.is_empty() {
        bail!("At least one team name is required");
    }
    if let Some(blank) = names.iter().position(|n| n.trim().is_empty()) {
        bail!("Team name #{} is empty", blank + 1);
    }

    let mut teams: Vec<Team> = names
        .iter()
        .enumerate()
        .map(|(i, name)| Team {
            id: team_id(i),
            name: name.trim().to_string(),
            pilot_ids: Vec::new(),
        })
        .collect();

    for (i, standing) in standings.iter().enumerate() {
        let slot = i % teams.len();
        teams[slot].pilot_ids.push(standing.pilot_id.clone());
    }

    log::debug!(
        "Dealt {} pilots into {} teams",
        standings.len(),
        teams.len()
    );

    Ok(teams)
}
