//! User preferences for the `bolnotes` command.
//!
//! Stored as JSON at an OS-appropriate location. A missing or corrupt file
//! yields the defaults.

use anyhow::{bail, Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Spaces per nesting level in listings and plain-text exports.
    pub indent_width: usize,
    /// chrono format string used to print dates.
    pub date_format: String,
    /// Title given to documents created without `--title`.
    pub default_title: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            indent_width: 2,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            default_title: "Untitled".to_string(),
        }
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/bolnotes/settings.json`
/// - Windows: `%APPDATA%/Bolnotes/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("Bolnotes").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("bolnotes").join("settings.json")
    }
}

/// Rejects chrono format strings with unknown specifiers such as `%Q`.
pub fn validate_date_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        bail!("invalid date format '{format}'");
    }
    Ok(())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring corrupt settings file {}: {e}", path.display());
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings(settings: &AppSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create settings directory")?;
    }
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    fs::write(path, json).context("Failed to write settings")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&dir.path().join("nope.json"));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path), AppSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            indent_width: 4,
            date_format: "%d.%m.%Y".to_string(),
            default_title: "Notes".to_string(),
        };
        save_settings(&settings, &path).unwrap();
        assert_eq!(load_settings(&path), settings);
    }

    #[test]
    fn test_validate_date_format() {
        assert!(validate_date_format("%Y-%m-%d %H:%M").is_ok());
        assert!(validate_date_format("%d.%m.%Y").is_ok());
        assert!(validate_date_format("%Q").is_err());
        assert!(validate_date_format("%Y %").is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"indentWidth": 8}"#).unwrap();
        let settings = load_settings(&path);
        assert_eq!(settings.indent_width, 8);
        assert_eq!(settings.default_title, "Untitled");
    }
}
