use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::types::Kart;

/// Grid generation settings as written in the config file.
///
/// Strings and signed integers are kept raw here so that a bad value is
/// reported by validation instead of failing the whole file parse.
///
/// Example YAML:
/// ```yaml
/// grid:
///   race_count: 2
///   groups_per_race: 2
///   pilots_per_group: 10
///   first_start_time: "10:00"
///   interval_minutes: 30
///   split_mode: level
///   parity_390: odd
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    pub race_count: i64,
    pub groups_per_race: i64,
    pub pilots_per_group: i64,
    pub first_start_time: String,
    pub interval_minutes: i64,
    pub split_mode: String,
    pub parity_390: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            race_count: 2,
            groups_per_race: 2,
            pilots_per_group: 10,
            first_start_time: "10:00".to_string(),
            interval_minutes: 30,
            split_mode: "classification".to_string(),
            parity_390: "odd".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("grid.{field}: must be a positive integer, got {value}")]
    NonPositive { field: &'static str, value: i64 },
    #[error("grid.{field}: must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: i64,
        max: i64,
    },
    #[error("grid.first_start_time: expected HH:mm, got '{0}'")]
    InvalidStartTime(String),
    #[error("grid.split_mode: unknown mode '{0}' (classification, random, level, team, kart)")]
    UnknownSplitMode(String),
    #[error("grid.parity_390: expected 'odd' or 'even', got '{0}'")]
    UnknownParity(String),
}

/// How selected pilots are distributed into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    Classification,
    Random,
    Level,
    Team,
    Kart,
}

impl SplitMode {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(SplitMode::Classification),
            "random" => Ok(SplitMode::Random),
            "level" => Ok(SplitMode::Level),
            "team" => Ok(SplitMode::Team),
            "kart" => Ok(SplitMode::Kart),
            _ => Err(ConfigError::UnknownSplitMode(s.to_string())),
        }
    }
}

/// Whether 390cc takes the odd or the even start positions of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "odd" => Ok(Parity::Odd),
            "even" => Ok(Parity::Even),
            _ => Err(ConfigError::UnknownParity(s.to_string())),
        }
    }

    /// First start position handed to the given category (1 or 2).
    pub fn first_position(self, kart: Kart) -> u32 {
        match (self, kart) {
            (Parity::Odd, Kart::Cc390) | (Parity::Even, Kart::Cc270) => 1,
            _ => 2,
        }
    }
}

/// Parse a strict 24-hour `HH:mm` clock time.
pub fn parse_start_time(s: &str) -> Result<NaiveTime, ConfigError> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 5
        && bytes[2] == b':'
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[3..].iter().all(u8::is_ascii_digit);
    if !shaped {
        return Err(ConfigError::InvalidStartTime(s.to_string()));
    }
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| ConfigError::InvalidStartTime(s.to_string()))
}

/// Upper bound for `race_count`, `groups_per_race` and `pilots_per_group`.
pub const MAX_GRID_COUNT: i64 = 100;

/// Upper bound for `interval_minutes`: one day.
pub const MAX_INTERVAL_MINUTES: i64 = 24 * 60;

/// A grid configuration that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPlan {
    pub race_count: usize,
    pub groups_per_race: usize,
    pub pilots_per_group: usize,
    pub first_start_time: NaiveTime,
    pub interval_minutes: i64,
    pub split_mode: SplitMode,
    pub parity_390: Parity,
}

impl GridPlan {
    /// Number of grid slots per race
    pub fn capacity(&self) -> usize {
        self.groups_per_race.saturating_mul(self.pilots_per_group)
    }

    /// Clock time of the race at `race_index` (0-based), wrapping past midnight
    pub fn start_time(&self, race_index: usize) -> NaiveTime {
        let interval = self.interval_minutes.rem_euclid(MAX_INTERVAL_MINUTES);
        let races = (race_index as i64).rem_euclid(MAX_INTERVAL_MINUTES);
        let offset = chrono::Duration::minutes((interval * races) % MAX_INTERVAL_MINUTES);
        self.first_start_time.overflowing_add_signed(offset).0
    }
}
