use serde::{Deserialize, Serialize};

/// Race points configuration.
///
/// Points fall linearly with the position inside a category and never drop
/// below `minimum_points`. Bonuses are flat amounts.
///
/// Example YAML:
/// ```yaml
/// scoring:
///   first_place_points: 40
///   points_step: 2
///   minimum_points: 2
///   collective_bonus: 20
///   individual_bonus: 20
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub first_place_points: u32,
    pub points_step: u32,
    pub minimum_points: u32,
    /// Awarded to every pilot of the race winner's category
    pub collective_bonus: u32,
    /// Awarded to winning-category pilots ahead of the other category's best finisher
    pub individual_bonus: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            first_place_points: 40,
            points_step: 2,
            minimum_points: 2,
            collective_bonus: 20,
            individual_bonus: 20,
        }
    }
}

impl ScoringConfig {
    /// Points for a 1-based position inside a category
    pub fn base_points(&self, category_position: u32) -> u32 {
        let drop = category_position
            .saturating_sub(1)
            .saturating_mul(self.points_step);
        self.first_place_points
            .saturating_sub(drop)
            .max(self.minimum_points)
    }
}
