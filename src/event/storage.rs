use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::migrate::migrate;
use super::types::EventState;

/// Default event file path (~/.config/grid-marshal/event.json)
pub fn get_event_path() -> PathBuf {
    crate::config::get_config_dir().join("event.json")
}

/// Load an event from a JSON file.
///
/// A missing file yields a new empty event. Older documents are migrated to
/// the current version; unknown future versions are an error.
pub fn load_event(path: &Path) -> Result<EventState> {
    if !path.exists() {
        return Ok(EventState::default());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open event file at {}", path.display()))?;
    let doc: serde_json::Value = serde_json::from_reader(file)
        .with_context(|| format!("Failed to read event file at {}", path.display()))?;

    migrate(doc).with_context(|| format!("Failed to load event file at {}", path.display()))
}

/// Save an event to a JSON file atomically.
///
/// The parent directory is created when missing.
pub fn save_event(path: &Path, state: &EventState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, state).context("Failed to serialize event")?;

    file.commit().context("Failed to save event")?;

    Ok(())
}
