use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::config::{get_config_path, Config};
use crate::grid::{parse_start_time, Parity, SplitMode, MAX_GRID_COUNT, MAX_INTERVAL_MINUTES};

/// Prompt user with a message and return their trimmed input.
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout()
        .flush()
        .context("Failed to flush stdout")?;
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim().to_string())
}

/// Prompt user with a message and a default value. Returns default if input is empty.
fn prompt_with_default(message: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}]: ", message, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

/// Prompt until the answer is an integer in `1..=max`.
fn prompt_positive(message: &str, default: i64, max: i64) -> Result<i64> {
    loop {
        let input = prompt_with_default(message, &default.to_string())?;
        match input.parse::<i64>() {
            Ok(v) if v > 0 && v <= max => return Ok(v),
            _ => println!("  Invalid: must be a whole number from 1 to {}. Try again.", max),
        }
    }
}

/// Prompt until `check` accepts the answer.
fn prompt_checked<T, E: std::fmt::Display>(
    message: &str,
    default: &str,
    check: impl Fn(&str) -> Result<T, E>,
) -> Result<String> {
    loop {
        let input = prompt_with_default(message, default)?;
        match check(&input) {
            Ok(_) => return Ok(input),
            Err(e) => println!("  Invalid: {}. Try again.", e),
        }
    }
}

fn to_yaml(config: &Config) -> Result<String> {
    serde_saphyr::to_string(config).map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    let yaml = to_yaml(config)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    std::fs::write(path, &yaml)
        .with_context(|| format!("Failed to write config to {}", path.display()))
}

/// Write the default configuration.
///
/// Refuses to replace an existing file unless `force` is set. Returns the
/// path written.
pub fn write_default_config(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let config_path = path.unwrap_or_else(get_config_path);
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite",
            config_path.display()
        );
    }

    write_config(&config_path, &Config::default())?;
    Ok(config_path)
}

/// Run the interactive init wizard to create a config file.
///
/// Asks for the grid layout and qualy seat count; scoring and correction keep
/// their defaults and can be edited in the file afterwards.
pub fn run_init_wizard(default_path: Option<PathBuf>, force: bool) -> Result<()> {
    println!();
    println!("Grid Marshal Configuration Wizard");
    println!("=================================");
    println!();

    let mut config = Config::default();
    let grid = &mut config.grid;

    grid.race_count = prompt_positive("Races per event", grid.race_count, MAX_GRID_COUNT)?;
    grid.groups_per_race =
        prompt_positive("Groups per race", grid.groups_per_race, MAX_GRID_COUNT)?;
    grid.pilots_per_group =
        prompt_positive("Pilots per group", grid.pilots_per_group, MAX_GRID_COUNT)?;
    grid.first_start_time = prompt_checked(
        "First race start time (HH:mm)",
        &grid.first_start_time,
        parse_start_time,
    )?;
    grid.interval_minutes = prompt_positive(
        "Minutes between races",
        grid.interval_minutes,
        MAX_INTERVAL_MINUTES,
    )?;

    println!();
    println!("Split modes decide which group a pilot lands in:");
    println!("  classification  -- by combined standings");
    println!("  random          -- shuffled");
    println!("  level           -- PRO, then AMATEUR, then PRINCIPIANTE");
    println!("  team            -- teams spread across groups");
    println!("  kart            -- 390cc first, then 270cc");
    grid.split_mode = prompt_checked("Split mode", &grid.split_mode, SplitMode::parse)?;
    grid.parity_390 = prompt_checked(
        "Start positions for 390cc (odd/even)",
        &grid.parity_390,
        Parity::parse,
    )?;

    println!();
    let seats = prompt_positive(
        "Pilots per qualy session",
        config.qualy.max_participants as i64,
        MAX_GRID_COUNT,
    )?;
    config.qualy.max_participants = seats as usize;

    let default_config_path = default_path.unwrap_or_else(get_config_path);
    println!();
    let path_str = prompt_with_default(
        "Where should the config be saved?",
        &default_config_path.display().to_string(),
    )?;
    let config_path = PathBuf::from(&path_str);

    if config_path.exists() && !force {
        let answer = prompt(&format!(
            "Config already exists at {}. Overwrite? [y/N]: ",
            config_path.display()
        ))?;
        if !matches!(answer.to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    write_config(&config_path, &config)?;

    println!();
    println!("Config written to {}", config_path.display());
    println!("Run `grid-marshal standings` to get started.");

    Ok(())
}
