use super::config::{
    parse_start_time, ConfigError, GridConfig, GridPlan, Parity, SplitMode, MAX_GRID_COUNT,
    MAX_INTERVAL_MINUTES,
};

fn bounded(
    field: &'static str,
    value: i64,
    max: i64,
    errors: &mut Vec<ConfigError>,
) -> usize {
    if value <= 0 {
        errors.push(ConfigError::NonPositive { field, value });
        0
    } else if value > max {
        errors.push(ConfigError::TooLarge { field, value, max });
        0
    } else {
        value as usize
    }
}

/// Validate grid configuration before any computation.
/// Returns all validation errors at once (not just the first).
pub fn validate_grid(config: &GridConfig) -> Result<GridPlan, Vec<ConfigError>> {
    let mut errors = Vec::new();

    let race_count = bounded("race_count", config.race_count, MAX_GRID_COUNT, &mut errors);
    let groups_per_race = bounded(
        "groups_per_race",
        config.groups_per_race,
        MAX_GRID_COUNT,
        &mut errors,
    );
    let pilots_per_group = bounded(
        "pilots_per_group",
        config.pilots_per_group,
        MAX_GRID_COUNT,
        &mut errors,
    );
    bounded(
        "interval_minutes",
        config.interval_minutes,
        MAX_INTERVAL_MINUTES,
        &mut errors,
    );

    let first_start_time = parse_start_time(&config.first_start_time)
        .map_err(|e| errors.push(e))
        .ok();
    let split_mode = SplitMode::parse(&config.split_mode)
        .map_err(|e| errors.push(e))
        .ok();
    let parity_390 = Parity::parse(&config.parity_390)
        .map_err(|e| errors.push(e))
        .ok();

    match (first_start_time, split_mode, parity_390) {
        (Some(first_start_time), Some(split_mode), Some(parity_390)) if errors.is_empty() => {
            Ok(GridPlan {
                race_count,
                groups_per_race,
                pilots_per_group,
                first_start_time,
                interval_minutes: config.interval_minutes,
                split_mode,
                parity_390,
            })
        }
        _ => Err(errors),
    }
}
