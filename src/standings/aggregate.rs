use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::event::types::{pilot_index, Kart, Pilot, Team};
use crate::scoring::RaceComputedResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualStandingRow {
    pub position: u32,
    pub pilot_id: String,
    pub number: Option<u32>,
    pub full_name: Option<String>,
    pub category: Option<Kart>,
    /// Points per race, in the order the races were given; 0 when absent
    pub race_points: Vec<u32>,
    pub total_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberPoints {
    pub pilot_id: String,
    pub full_name: Option<String>,
    pub total_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStandingRow {
    pub position: u32,
    pub team_id: String,
    pub team_name: String,
    pub total_points: u32,
    pub members: Vec<TeamMemberPoints>,
}

fn saturating_total(points: impl IntoIterator<Item = u32>) -> u32 {
    points.into_iter().fold(0, u32::saturating_add)
}

fn total_for(results: &[&RaceComputedResult], pilot_id: &str) -> u32 {
    saturating_total(results.iter().map(|r| r.points_of(pilot_id)))
}

/// Fold race results into the individual championship.
///
/// Every pilot with an entry in at least one race gets a row. Ordered by
/// total points descending, then pilot number ascending; pilots missing from
/// the directory sort after numbered ones, by id.
pub fn individual_standings(
    results: &[&RaceComputedResult],
    pilots: &[Pilot],
) -> Vec<IndividualStandingRow> {
    let index = pilot_index(pilots);
    let pilot_ids: BTreeSet<&str> = results
        .iter()
        .flat_map(|r| r.entries.iter().map(|e| e.pilot_id.as_str()))
        .collect();

    let mut rows: Vec<IndividualStandingRow> = pilot_ids
        .into_iter()
        .map(|pilot_id| {
            let pilot = index.get(pilot_id);
            let race_points: Vec<u32> = results.iter().map(|r| r.points_of(pilot_id)).collect();
            let category = pilot.map(|p| p.kart).or_else(|| {
                results
                    .iter()
                    .find_map(|r| r.entry(pilot_id))
                    .map(|e| e.category)
            });
            IndividualStandingRow {
                position: 0,
                pilot_id: pilot_id.to_string(),
                number: pilot.map(|p| p.number),
                full_name: pilot.map(|p| p.full_name.clone()),
                category,
                total_points: saturating_total(race_points.iter().copied()),
                race_points,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.number.unwrap_or(u32::MAX).cmp(&b.number.unwrap_or(u32::MAX)))
            .then_with(|| a.pilot_id.cmp(&b.pilot_id))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.position = i as u32 + 1;
    }
    rows
}

/// Fold race results into the team championship.
///
/// A team's total is the sum of its members' totals. Teams without members
/// are left out; members who never raced still appear with 0.
pub fn team_standings(
    results: &[&RaceComputedResult],
    teams: &[Team],
    pilots: &[Pilot],
) -> Vec<TeamStandingRow> {
    let names: HashMap<&str, &str> = pilots
        .iter()
        .map(|p| (p.id.as_str(), p.full_name.as_str()))
        .collect();

    let mut rows: Vec<TeamStandingRow> = teams
        .iter()
        .filter(|t| !t.pilot_ids.is_empty())
        .map(|team| {
            let members: Vec<TeamMemberPoints> = team
                .pilot_ids
                .iter()
                .map(|pilot_id| TeamMemberPoints {
                    pilot_id: pilot_id.clone(),
                    full_name: names.get(pilot_id.as_str()).map(|n| n.to_string()),
                    total_points: total_for(results, pilot_id),
                })
                .collect();
            TeamStandingRow {
                position: 0,
                team_id: team.id.clone(),
                team_name: team.name.clone(),
                total_points: saturating_total(members.iter().map(|m| m.total_points)),
                members,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.team_name.cmp(&b.team_name))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.position = i as u32 + 1;
    }
    rows
}
