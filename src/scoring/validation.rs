use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::config::ScoringConfig;
use super::engine::RaceFinish;
use crate::grid::Race;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultsError {
    #[error("pilot '{pilot_id}' in group {group} has no finishing position")]
    MissingPosition { pilot_id: String, group: u32 },
    #[error("group {group}: position {position} entered more than once")]
    DuplicatePosition { group: u32, position: u32 },
    #[error("pilot '{pilot_id}': finishing position must be at least 1")]
    InvalidPosition { pilot_id: String },
    #[error("pilot '{0}' is not on this race's grid")]
    UnknownPilot(String),
}

/// Most points a single race may award one pilot.
///
/// Keeps championship totals far from `u32::MAX` for any realistic number of races.
pub const MAX_RACE_POINTS: u32 = 10_000;

/// Validate scoring configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_scoring(config: &ScoringConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.first_place_points == 0 {
        errors.push("scoring.first_place_points: must be positive".to_string());
    }
    if config.minimum_points > config.first_place_points {
        errors.push(format!(
            "scoring.minimum_points: {} exceeds first_place_points {}",
            config.minimum_points, config.first_place_points
        ));
    }
    let best_race = u64::from(config.first_place_points)
        + u64::from(config.collective_bonus)
        + u64::from(config.individual_bonus);
    if best_race > u64::from(MAX_RACE_POINTS) {
        errors.push(format!(
            "scoring: first_place_points + collective_bonus + individual_bonus is {}, at most {} allowed",
            best_race, MAX_RACE_POINTS
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check entered positions against the race grid before scoring.
///
/// Every grid pilot needs a position of at least 1, no position may repeat
/// inside a group, and nobody outside the grid may appear. On success the
/// finishes come back in group order, then by position.
pub fn validate_finishing_positions(
    race: &Race,
    positions: &BTreeMap<String, u32>,
) -> Result<Vec<RaceFinish>, Vec<ResultsError>> {
    let mut errors = Vec::new();
    let mut finishes = Vec::new();

    for pilot_id in positions.keys() {
        if race.locate(pilot_id).is_none() {
            errors.push(ResultsError::UnknownPilot(pilot_id.clone()));
        }
    }

    for group in &race.groups {
        let mut taken: HashMap<u32, usize> = HashMap::new();
        let mut group_finishes = Vec::new();
        for (kart, pilot) in group.pilots() {
            match positions.get(&pilot.pilot_id) {
                None => errors.push(ResultsError::MissingPosition {
                    pilot_id: pilot.pilot_id.clone(),
                    group: group.group,
                }),
                Some(0) => errors.push(ResultsError::InvalidPosition {
                    pilot_id: pilot.pilot_id.clone(),
                }),
                Some(&position) => {
                    *taken.entry(position).or_default() += 1;
                    group_finishes.push(RaceFinish {
                        pilot_id: pilot.pilot_id.clone(),
                        category: kart,
                        group: group.group,
                        final_position: position,
                    });
                }
            }
        }

        let mut duplicates: Vec<u32> = taken
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(position, _)| position)
            .collect();
        duplicates.sort_unstable();
        errors.extend(duplicates.into_iter().map(|position| ResultsError::DuplicatePosition {
            group: group.group,
            position,
        }));

        group_finishes.sort_by_key(|f| f.final_position);
        finishes.extend(group_finishes);
    }

    if errors.is_empty() {
        Ok(finishes)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::Kart;
    use crate::grid::{GridPilot, Group};
    use crate::standings::StandingSource;

    fn grid_pilot(id: &str, start: u32) -> GridPilot {
        GridPilot {
            pilot_id: id.to_string(),
            number: start,
            full_name: id.to_string(),
            final_time: 50.0,
            source: StandingSource::TimeAttack,
            standing_position: start,
            qualy_time: None,
            start_position: start,
        }
    }

    fn race() -> Race {
        Race {
            race: 1,
            start_time: "10:00".to_string(),
            groups: vec![
                Group {
                    group: 1,
                    cc390: vec![grid_pilot("a", 1)],
                    cc270: vec![grid_pilot("b", 2)],
                },
                Group {
                    group: 2,
                    cc390: vec![grid_pilot("c", 1)],
                    cc270: vec![grid_pilot("d", 2)],
                },
            ],
        }
    }

    fn positions(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_valid_positions() {
        let finishes =
            validate_finishing_positions(&race(), &positions(&[("a", 2), ("b", 1), ("c", 1), ("d", 2)]))
                .unwrap();
        let order: Vec<_> = finishes.iter().map(|f| f.pilot_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
        assert_eq!(finishes[1].category, Kart::Cc390);
        assert_eq!(finishes[2].group, 2);
    }

    #[test]
    fn test_same_position_in_different_groups_is_fine() {
        assert!(validate_finishing_positions(
            &race(),
            &positions(&[("a", 1), ("b", 2), ("c", 1), ("d", 2)])
        )
        .is_ok());
    }

    #[test]
    fn test_missing_position() {
        let errors =
            validate_finishing_positions(&race(), &positions(&[("a", 1), ("b", 2), ("c", 1)]))
                .unwrap_err();
        assert_eq!(
            errors,
            vec![ResultsError::MissingPosition {
                pilot_id: "d".to_string(),
                group: 2
            }]
        );
    }

    #[test]
    fn test_duplicate_position_in_group() {
        let errors = validate_finishing_positions(
            &race(),
            &positions(&[("a", 1), ("b", 1), ("c", 1), ("d", 2)]),
        )
        .unwrap_err();
        assert_eq!(
            errors,
            vec![ResultsError::DuplicatePosition {
                group: 1,
                position: 1
            }]
        );
    }

    #[test]
    fn test_collects_all_errors() {
        let errors = validate_finishing_positions(
            &race(),
            &positions(&[("a", 0), ("c", 3), ("d", 3), ("zz", 1)]),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ResultsError::UnknownPilot("zz".to_string())));
        assert!(errors.contains(&ResultsError::InvalidPosition {
            pilot_id: "a".to_string()
        }));
    }

    #[test]
    fn test_valid_scoring_config() {
        assert!(validate_scoring(&ScoringConfig::default()).is_ok());
    }

    #[test]
    fn test_minimum_above_first_place_rejected() {
        let config = ScoringConfig {
            first_place_points: 10,
            minimum_points: 12,
            ..ScoringConfig::default()
        };
        let errors = validate_scoring(&config).unwrap_err();
        assert!(errors[0].contains("scoring.minimum_points"));
    }

    #[test]
    fn test_oversized_bonus_rejected() {
        let config = ScoringConfig {
            collective_bonus: u32::MAX,
            ..ScoringConfig::default()
        };
        let errors = validate_scoring(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("collective_bonus"));
    }

    #[test]
    fn test_race_points_cap_is_inclusive() {
        let config = ScoringConfig {
            first_place_points: MAX_RACE_POINTS - 40,
            collective_bonus: 20,
            individual_bonus: 20,
            ..ScoringConfig::default()
        };
        assert!(validate_scoring(&config).is_ok());

        let over = ScoringConfig {
            individual_bonus: 21,
            ..config
        };
        assert!(validate_scoring(&over).is_err());
    }

    #[test]
    fn test_zero_first_place_rejected() {
        let config = ScoringConfig {
            first_place_points: 0,
            minimum_points: 0,
            ..ScoringConfig::default()
        };
        let errors = validate_scoring(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
