use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::config::ScoringConfig;
use crate::event::types::Kart;

/// One pilot's finish as entered by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceFinish {
    pub pilot_id: String,
    pub category: Kart,
    pub group: u32,
    pub final_position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceResultEntry {
    pub race: u32,
    pub pilot_id: String,
    pub category: Kart,
    pub final_position: u32,
    pub category_position: u32,
    pub base_points: u32,
    pub collective_bonus: u32,
    pub individual_bonus: u32,
    pub final_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceComputedResult {
    pub race: u32,
    pub entries: Vec<RaceResultEntry>,
    pub general_winner_pilot_id: Option<String>,
    pub winning_category: Option<Kart>,
    pub opposite_category_first_pilot_id: Option<String>,
    pub calculated_at: DateTime<Utc>,
}

impl RaceComputedResult {
    pub fn entry(&self, pilot_id: &str) -> Option<&RaceResultEntry> {
        self.entries.iter().find(|e| e.pilot_id == pilot_id)
    }

    pub fn points_of(&self, pilot_id: &str) -> u32 {
        self.entry(pilot_id).map_or(0, |e| e.final_points)
    }
}

/// Score one race, stamped with the current time.
pub fn score_race(race: u32, finishes: &[RaceFinish], config: &ScoringConfig) -> RaceComputedResult {
    score_race_at(race, finishes, config, Utc::now())
}

/// Score one race.
///
/// Finishes must already be validated (complete, no duplicate position inside
/// a group). Positions are compared across groups; equal positions from
/// different groups keep their input order.
pub fn score_race_at(
    race: u32,
    finishes: &[RaceFinish],
    config: &ScoringConfig,
    calculated_at: DateTime<Utc>,
) -> RaceComputedResult {
    let mut order: Vec<&RaceFinish> = finishes.iter().collect();
    order.sort_by_key(|f| f.final_position);

    let winner = order.first().copied();
    let winning_category = winner.map(|w| w.category);
    let opposite_first = winning_category
        .and_then(|cat| order.iter().copied().find(|f| f.category != cat));

    let mut seen_390 = 0u32;
    let mut seen_270 = 0u32;
    let entries: Vec<RaceResultEntry> = order
        .iter()
        .map(|f| {
            let counter = match f.category {
                Kart::Cc390 => &mut seen_390,
                Kart::Cc270 => &mut seen_270,
            };
            *counter += 1;
            let category_position = *counter;

            let in_winning = Some(f.category) == winning_category;
            let base_points = config.base_points(category_position);
            let collective_bonus = if in_winning { config.collective_bonus } else { 0 };
            // Every winning-category pilot ahead of the rival leader earns it, not only the winner
            let individual_bonus = match opposite_first {
                Some(rival) if in_winning && f.final_position < rival.final_position => {
                    config.individual_bonus
                }
                _ => 0,
            };

            RaceResultEntry {
                race,
                pilot_id: f.pilot_id.clone(),
                category: f.category,
                final_position: f.final_position,
                category_position,
                base_points,
                collective_bonus,
                individual_bonus,
                // Cannot saturate once the config passed validate_scoring
                final_points: base_points
                    .saturating_add(collective_bonus)
                    .saturating_add(individual_bonus),
            }
        })
        .collect();

    debug!(
        "Race {} scored: {} entries, winner {:?} ({:?})",
        race,
        entries.len(),
        winner.map(|w| w.pilot_id.as_str()),
        winning_category
    );

    RaceComputedResult {
        race,
        entries,
        general_winner_pilot_id: winner.map(|w| w.pilot_id.clone()),
        winning_category,
        opposite_category_first_pilot_id: opposite_first.map(|f| f.pilot_id.clone()),
        calculated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn finish(pilot_id: &str, category: Kart, group: u32, position: u32) -> RaceFinish {
        RaceFinish {
            pilot_id: pilot_id.to_string(),
            category,
            group,
            final_position: position,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_winner_and_bonuses() {
        // 390cc wins; best 270cc finisher is third
        let finishes = vec![
            finish("x", Kart::Cc390, 1, 1),
            finish("y", Kart::Cc390, 1, 2),
            finish("z", Kart::Cc270, 1, 3),
            finish("w", Kart::Cc390, 1, 4),
            finish("v", Kart::Cc270, 1, 5),
        ];
        let result = score_race_at(1, &finishes, &ScoringConfig::default(), at());

        assert_eq!(result.general_winner_pilot_id.as_deref(), Some("x"));
        assert_eq!(result.winning_category, Some(Kart::Cc390));
        assert_eq!(result.opposite_category_first_pilot_id.as_deref(), Some("z"));

        let x = result.entry("x").unwrap();
        assert_eq!((x.base_points, x.collective_bonus, x.individual_bonus), (40, 20, 20));
        assert_eq!(x.final_points, 80);

        let y = result.entry("y").unwrap();
        assert_eq!(y.category_position, 2);
        assert_eq!((y.base_points, y.collective_bonus, y.individual_bonus), (38, 20, 20));

        let z = result.entry("z").unwrap();
        assert_eq!(z.category_position, 1);
        assert_eq!((z.base_points, z.collective_bonus, z.individual_bonus), (40, 0, 0));

        // Behind the rival leader: collective only
        let w = result.entry("w").unwrap();
        assert_eq!(w.category_position, 3);
        assert_eq!((w.base_points, w.collective_bonus, w.individual_bonus), (36, 20, 0));

        let v = result.entry("v").unwrap();
        assert_eq!((v.base_points, v.collective_bonus, v.individual_bonus), (38, 0, 0));
        assert_eq!(result.calculated_at, at());
    }

    #[test]
    fn test_entries_in_finishing_order() {
        let finishes = vec![
            finish("c", Kart::Cc270, 1, 3),
            finish("a", Kart::Cc270, 1, 1),
            finish("b", Kart::Cc390, 1, 2),
        ];
        let result = score_race_at(2, &finishes, &ScoringConfig::default(), at());
        let order: Vec<_> = result.entries.iter().map(|e| e.pilot_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(result.entries.iter().all(|e| e.race == 2));
        assert_eq!(result.winning_category, Some(Kart::Cc270));
    }

    #[test]
    fn test_equal_positions_across_groups_keep_group_order() {
        let finishes = vec![
            finish("g1-1", Kart::Cc270, 1, 1),
            finish("g1-2", Kart::Cc390, 1, 2),
            finish("g2-1", Kart::Cc390, 2, 1),
            finish("g2-2", Kart::Cc270, 2, 2),
        ];
        let result = score_race_at(1, &finishes, &ScoringConfig::default(), at());
        assert_eq!(result.general_winner_pilot_id.as_deref(), Some("g1-1"));
        assert_eq!(result.opposite_category_first_pilot_id.as_deref(), Some("g2-1"));
        // g2-1 shares position 1 with the winner, so it is not strictly behind
        let g22 = result.entry("g2-2").unwrap();
        assert_eq!(g22.category_position, 2);
        assert_eq!(g22.individual_bonus, 0);
        assert_eq!(result.entry("g1-1").unwrap().individual_bonus, 0);
    }

    #[test]
    fn test_single_category_race_has_no_individual_bonus() {
        let finishes = vec![finish("a", Kart::Cc390, 1, 1), finish("b", Kart::Cc390, 1, 2)];
        let result = score_race_at(1, &finishes, &ScoringConfig::default(), at());
        assert_eq!(result.opposite_category_first_pilot_id, None);
        assert!(result.entries.iter().all(|e| e.individual_bonus == 0));
        assert!(result.entries.iter().all(|e| e.collective_bonus == 20));
    }

    #[test]
    fn test_unvalidated_bonus_saturates() {
        let config = ScoringConfig {
            collective_bonus: u32::MAX,
            ..ScoringConfig::default()
        };
        let finishes = vec![finish("a", Kart::Cc390, 1, 1), finish("b", Kart::Cc270, 1, 2)];
        let result = score_race_at(1, &finishes, &config, at());
        assert_eq!(result.entry("a").unwrap().final_points, u32::MAX);
        assert_eq!(result.entry("b").unwrap().final_points, 40);
    }

    #[test]
    fn test_empty_race() {
        let result = score_race_at(1, &[], &ScoringConfig::default(), at());
        assert!(result.entries.is_empty());
        assert_eq!(result.general_winner_pilot_id, None);
        assert_eq!(result.winning_category, None);
    }

    #[test]
    fn test_custom_points_curve() {
        let config = ScoringConfig {
            first_place_points: 10,
            points_step: 3,
            minimum_points: 1,
            collective_bonus: 5,
            individual_bonus: 0,
        };
        let finishes = vec![
            finish("a", Kart::Cc390, 1, 1),
            finish("b", Kart::Cc390, 1, 2),
            finish("c", Kart::Cc390, 1, 3),
            finish("d", Kart::Cc390, 1, 4),
        ];
        let result = score_race_at(1, &finishes, &config, at());
        let points: Vec<_> = result.entries.iter().map(|e| e.base_points).collect();
        assert_eq!(points, vec![10, 7, 4, 1]);
        assert_eq!(result.entry("a").unwrap().final_points, 15);
    }

    #[test]
    fn test_points_of_absent_pilot_is_zero() {
        let result = score_race_at(1, &[finish("a", Kart::Cc390, 1, 1)], &ScoringConfig::default(), at());
        assert_eq!(result.points_of("a"), 60);
        assert_eq!(result.points_of("nobody"), 0);
    }

    #[test]
    fn test_result_json_field_names() {
        let result = score_race_at(1, &[finish("a", Kart::Cc390, 1, 1)], &ScoringConfig::default(), at());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["generalWinnerPilotId"], "a");
        assert_eq!(json["winningCategory"], "390cc");
        assert!(json["oppositeCategoryFirstPilotId"].is_null());
        assert_eq!(json["entries"][0]["finalPoints"], 60);
        assert_eq!(json["entries"][0]["categoryPosition"], 1);
        let back: RaceComputedResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    proptest! {
        #[test]
        fn prop_points_add_up(cats in proptest::collection::vec(any::<bool>(), 0..30)) {
            let finishes: Vec<RaceFinish> = cats
                .iter()
                .enumerate()
                .map(|(i, is_390)| finish(
                    &format!("p{}", i),
                    if *is_390 { Kart::Cc390 } else { Kart::Cc270 },
                    1,
                    i as u32 + 1,
                ))
                .collect();
            let result = score_race_at(1, &finishes, &ScoringConfig::default(), at());
            for e in &result.entries {
                prop_assert_eq!(e.final_points, e.base_points + e.collective_bonus + e.individual_bonus);
                if Some(e.category) != result.winning_category {
                    prop_assert_eq!(e.collective_bonus, 0);
                    prop_assert_eq!(e.individual_bonus, 0);
                }
            }
        }
    }
}
