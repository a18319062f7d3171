mod init;
mod schema;

pub use init::{run_init_wizard, write_default_config};
pub use schema::{Config, QualyConfig};

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Get the config directory path (~/.config/grid-marshal/)
pub fn get_config_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("grid-marshal")
}

/// Get the default config file path (~/.config/grid-marshal/config.yaml)
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.yaml")
}

/// Load configuration from a YAML file
///
/// # Arguments
///
/// * `path` - Optional path to config file. If None, uses default path (~/.config/grid-marshal/config.yaml)
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed or names an unknown field
///
/// A missing default config file is not an error; defaults apply.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let explicit = path.is_some();
    let config_path = path.unwrap_or_else(get_config_path);

    if !config_path.exists() {
        if explicit {
            anyhow::bail!("Config file not found at {}", config_path.display());
        }
        log::debug!(
            "No config at {}, using defaults",
            config_path.display()
        );
        return Ok(Config::default());
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    parse_config(&config_content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", config_path.display()))
}

/// Parse config file contents
pub fn parse_config(content: &str) -> Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_saphyr::from_str(content).map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(config)
}
