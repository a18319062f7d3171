pub mod config;
pub mod engine;
pub mod validation;

pub use config::ScoringConfig;
pub use engine::{score_race, score_race_at, RaceComputedResult, RaceFinish, RaceResultEntry};
pub use validation::{
    validate_finishing_positions, validate_scoring, ResultsError, MAX_RACE_POINTS,
};
