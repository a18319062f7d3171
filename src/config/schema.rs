use serde::{Deserialize, Serialize};

use crate::event::{EngineContext, EventError};
use crate::grid::GridConfig;
use crate::scoring::ScoringConfig;
use crate::timing::CorrectionConfig;

/// Whole config file. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub grid: GridConfig,
    pub scoring: ScoringConfig,
    pub qualy: QualyConfig,
    pub correction: CorrectionConfig,
    /// One of off, error, warn, info, debug, trace
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            scoring: ScoringConfig::default(),
            qualy: QualyConfig::default(),
            correction: CorrectionConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QualyConfig {
    /// Seats per qualy session
    pub max_participants: usize,
}

impl Default for QualyConfig {
    fn default() -> Self {
        Self {
            max_participants: 12,
        }
    }
}

impl Config {
    /// Validate every section and build the settings the reducer runs with.
    pub fn engine_context(&self) -> Result<EngineContext, EventError> {
        let mut errors = Vec::new();
        if crate::logging::parse_level(&self.log_level).is_none() {
            errors.push(format!("log_level: unknown level '{}'", self.log_level));
        }

        match EngineContext::new(
            &self.grid,
            self.scoring.clone(),
            self.qualy.max_participants,
            &self.correction,
        ) {
            Ok(ctx) if errors.is_empty() => Ok(ctx),
            Ok(_) => Err(EventError::Config(errors)),
            Err(EventError::Config(mut rest)) => {
                rest.extend(errors);
                Err(EventError::Config(rest))
            }
            Err(other) => Err(other),
        }
    }
}
