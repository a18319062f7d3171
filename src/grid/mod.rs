pub mod config;
pub mod partition;
pub mod validation;

pub use config::{
    parse_start_time, ConfigError, GridConfig, GridPlan, Parity, SplitMode, MAX_GRID_COUNT,
    MAX_INTERVAL_MINUTES,
};
pub use partition::{partition_grid, GridInputs, GridPilot, Group, Race};
pub use validation::validate_grid;
