use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::overview::Alignment;
use crate::peaks::DecodeStrategy;

/// Returns the path to the settings file: `~/.config/scope-peaks/settings.json`
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("scope-peaks");
    path.push("settings.json");
    path
}

/// Persisted tool settings.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    // Extraction
    pub samples_per_peak: usize,
    pub strategy: DecodeStrategy,
    pub alignment: Alignment,

    // Reading
    pub seconds_per_read: u32,
    pub threaded_decode: bool,
    pub ring_seconds: u32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            // Ten peaks per second at 44.1 kHz
            samples_per_peak: 44100 / 10,
            strategy: DecodeStrategy::default(),
            alignment: Alignment::default(),

            seconds_per_read: 4,
            threaded_decode: false,
            ring_seconds: 2,
        }
    }
}

impl ToolSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk as pretty JSON.
    pub fn save(&self) {
        self.save_to(&settings_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("Failed to write settings: {}", e);
                } else {
                    log::info!("Saved settings to {}", path.display());
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize settings: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("scope-peaks-settings-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_round_trip() {
        let path = temp_path("round_trip.json");
        let settings = ToolSettings {
            samples_per_peak: 512,
            strategy: DecodeStrategy::BulkCast,
            alignment: Alignment::Continuous,
            seconds_per_read: 1,
            threaded_decode: true,
            ring_seconds: 3,
        };
        settings.save_to(&path);
        assert_eq!(ToolSettings::load_from(&path), settings);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: ToolSettings =
            serde_json::from_str(r#"{ "strategy": "from_le_bytes" }"#).unwrap();
        assert_eq!(settings.strategy, DecodeStrategy::FromLeBytes);
        assert_eq!(settings.samples_per_peak, 4410);
        assert_eq!(settings.alignment, Alignment::PerChunk);
    }

    #[test]
    fn test_bad_file_falls_back() {
        let path = temp_path("broken.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ToolSettings::load_from(&path), ToolSettings::default());
        assert_eq!(ToolSettings::load_from(&temp_path("absent.json")), ToolSettings::default());
        std::fs::remove_file(path).ok();
    }
}
