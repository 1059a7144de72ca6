//! Settings loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::DirectorSettings;

/// Error type for settings loading.
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Load daemon settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<DirectorSettings, SettingsError> {
    let content = fs::read_to_string(path).map_err(SettingsError::Io)?;
    let settings: DirectorSettings = toml::from_str(&content).map_err(SettingsError::Parse)?;
    Ok(settings)
}
