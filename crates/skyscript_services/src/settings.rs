//! Settings management

use serde::{Deserialize, Serialize};
use skyscript_core::BridgeConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Runtime settings, read from `skyscript.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub runtime: RuntimeSettings,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub apps_dir: PathBuf,
    pub entry_script: String,
    /// Frames to drive before shutting down.
    pub frames: u32,
    pub frame_rate_hz: f64,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            apps_dir: PathBuf::from("apps"),
            entry_script: "main.js".to_string(),
            frames: 600,
            frame_rate_hz: 60.0,
        }
    }
}

impl LoggingSettings {
    pub fn max_level(&self) -> Result<tracing::Level, SettingsError> {
        self.level
            .trim()
            .parse::<tracing::Level>()
            .map_err(|_| SettingsError::Invalid {
                field: "logging.level",
                reason: format!("unknown level '{}'", self.level),
            })
    }
}

impl RuntimeSettings {
    /// Seconds between frames.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.frame_rate_hz
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Defaults when `path` does not exist. A present but broken file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.logging.max_level()?;
        let hz = self.runtime.frame_rate_hz;
        if !hz.is_finite() || hz <= 0.0 {
            return Err(SettingsError::Invalid {
                field: "runtime.frame_rate_hz",
                reason: format!("must be positive, got {hz}"),
            });
        }
        if self.runtime.entry_script.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "runtime.entry_script",
                reason: "empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write(dir: &TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("skyscript.json");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.logging.max_level().unwrap(), tracing::Level::INFO);
        assert_eq!(settings.runtime.apps_dir, PathBuf::from("apps"));
        assert_eq!(settings.runtime.entry_script, "main.js");
        assert_eq!(settings.runtime.frames, 600);
        assert!((settings.runtime.frame_interval() - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(settings.bridge, BridgeConfig::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new("skyscript-settings").unwrap();
        let settings = Settings::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new("skyscript-settings").unwrap();
        let path = write(
            &dir,
            r#"{
                "logging": {"level": "debug"},
                "runtime": {"frames": 3},
                "bridge": {"max_probes": 2}
            }"#,
        );
        let settings = Settings::load_or_default(&path).unwrap();
        assert_eq!(settings.logging.max_level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(settings.runtime.frames, 3);
        assert_eq!(settings.runtime.entry_script, "main.js");
        assert_eq!(settings.bridge.max_probes, Some(2));
        assert_eq!(settings.bridge.max_objects, None);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = TempDir::new("skyscript-settings").unwrap();
        let path = write(&dir, "{ not json");
        assert!(matches!(
            Settings::load_or_default(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        let dir = TempDir::new("skyscript-settings").unwrap();
        let path = write(&dir, r#"{"logging": {"level": "loud"}}"#);
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Invalid { field: "logging.level", .. })
        ));

        let path = write(&dir, r#"{"runtime": {"frame_rate_hz": 0}}"#);
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Invalid { field: "runtime.frame_rate_hz", .. })
        ));
    }
}
