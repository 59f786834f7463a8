//! TOML settings for pacing, thresholds and the alert cue.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::{CueSettings, DEFAULT_NOTIFICATION_COOLDOWN};
use crate::app_dirs;
use crate::classifier::ClassifierOptions;
use crate::embedding::{DEFAULT_GRID, MAX_GRID};
use crate::inference::{DEFAULT_TICK_INTERVAL, DEFAULT_TOUCH_THRESHOLD, InferenceOptions};
use crate::training::{DEFAULT_REPETITIONS, DEFAULT_TRAINING_INTERVAL, TrainingOptions};

/// Default filename used to store the app configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that may occur while loading or saving app configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The app directory could not be resolved.
    #[error(transparent)]
    AppDir(#[from] app_dirs::AppDirError),
    /// Failed to create the config directory.
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write a config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize config to TOML.
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    /// A value is outside its accepted range.
    #[error("Invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Application settings persisted in `config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub classifier: ClassifierOptions,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub camera: CameraSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    #[serde(default = "default_training_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,
    /// Minimum `touched` confidence (exclusive) for a touch decision.
    #[serde(default = "default_touch_threshold")]
    pub touch_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Thumbnail edge length fed to the built-in extractor.
    #[serde(default = "default_grid")]
    pub grid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "default_notification_cooldown_ms")]
    pub notification_cooldown_ms: u64,
    #[serde(flatten)]
    pub cue: CueSettings,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Directory of frames replayed in place of a live device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_dir: Option<PathBuf>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
            interval_ms: default_training_interval_ms(),
        }
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_tick_interval_ms(),
            touch_threshold: default_touch_threshold(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            grid: default_grid(),
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            notification_cooldown_ms: default_notification_cooldown_ms(),
            cue: CueSettings::default(),
        }
    }
}

fn default_repetitions() -> usize {
    DEFAULT_REPETITIONS
}

fn default_training_interval_ms() -> u64 {
    DEFAULT_TRAINING_INTERVAL.as_millis() as u64
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}

fn default_touch_threshold() -> f32 {
    DEFAULT_TOUCH_THRESHOLD
}

fn default_grid() -> u32 {
    DEFAULT_GRID
}

fn default_notification_cooldown_ms() -> u64 {
    DEFAULT_NOTIFICATION_COOLDOWN.as_millis() as u64
}

impl Config {
    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.inference.touch_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                field: "inference.touch_threshold",
                reason: format!("{threshold} is outside 0..=1"),
            });
        }
        if self.classifier.k == 0 {
            return Err(ConfigError::Invalid {
                field: "classifier.k",
                reason: "must be at least 1".into(),
            });
        }
        let grid = self.embedding.grid;
        if !(1..=MAX_GRID).contains(&grid) {
            return Err(ConfigError::Invalid {
                field: "embedding.grid",
                reason: format!("{grid} is outside 1..={MAX_GRID}"),
            });
        }
        let volume = self.alert.cue.volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::Invalid {
                field: "alert.volume",
                reason: format!("{volume} is outside 0..=1"),
            });
        }
        Ok(())
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            repetitions: self.training.repetitions,
            interval: Duration::from_millis(self.training.interval_ms),
        }
    }

    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            interval: Duration::from_millis(self.inference.interval_ms),
            touch_threshold: self.inference.touch_threshold,
        }
    }

    pub fn notification_cooldown(&self) -> Duration {
        Duration::from_millis(self.alert.notification_cooldown_ms)
    }
}

/// Resolve the configuration file path inside the app directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app directory, returning defaults if missing.
pub fn load_or_default() -> Result<Config, ConfigError> {
    load_from(&config_path()?)
}

/// Load configuration from `path`, returning defaults if the file is missing.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
