//! Static runtime configuration
//!
//! Read once at startup from `$XDG_CONFIG_HOME/couchpad/config.toml`, or the
//! file named by `COUCHPAD_CONFIG`. Every field has a default, so a missing
//! file or a partial one is fine. The file is never written back.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_DIR: &str = "couchpad";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "COUCHPAD_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub sampling: SamplingConfig,
    pub throttle: ThrottleConfig,
    pub volume: VolumeConfig,
    pub osd: OsdConfig,
    pub dispatch: DispatchConfig,
}

/// Input sampling parameters
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    /// Axis magnitude at or below which a stick counts as centered
    pub deadzone: f32,
    /// Analog pressure at which a trigger counts as held
    pub press_threshold: f32,
    /// Frame rate of the built-in frame pacer
    pub refresh_hz: u32,
    /// Right stick vertical axis slot
    pub volume_axis: usize,
    /// Probed when `volume_axis` is not reported by the driver
    pub volume_axis_fallback: Option<usize>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.35,
            press_threshold: 0.5,
            refresh_hz: 60,
            volume_axis: 3,
            volume_axis_fallback: Some(2),
        }
    }
}

/// Throttle windows per gesture family, in milliseconds
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ThrottleConfig {
    pub navigation_ms: u64,
    pub button_ms: u64,
    pub media_ms: u64,
    pub seek_ms: u64,
    pub volume_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 200,
            button_ms: 220,
            media_ms: 300,
            seek_ms: 130,
            volume_ms: 160,
        }
    }
}

impl ThrottleConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn button(&self) -> Duration {
        Duration::from_millis(self.button_ms)
    }

    pub fn media(&self) -> Duration {
        Duration::from_millis(self.media_ms)
    }

    pub fn seek(&self) -> Duration {
        Duration::from_millis(self.seek_ms)
    }

    pub fn volume(&self) -> Duration {
        Duration::from_millis(self.volume_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VolumeConfig {
    /// Volume change per step, as a fraction of full scale
    pub step: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { step: 0.05 }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OsdConfig {
    /// How long the indicator stays visible after the last change
    pub dwell_ms: u64,
}

impl Default for OsdConfig {
    fn default() -> Self {
        Self { dwell_ms: 900 }
    }
}

impl OsdConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Pending messages before new ones are dropped
    pub capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl AppConfig {
    /// Loads from the environment override or the user config directory
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                info!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                info!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sampling = &self.sampling;
        if !(0.0..1.0).contains(&sampling.deadzone) {
            return Err(ConfigError::Invalid(format!(
                "sampling.deadzone must be in [0, 1), got {}",
                sampling.deadzone
            )));
        }
        if !(sampling.press_threshold > 0.0 && sampling.press_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "sampling.press_threshold must be in (0, 1], got {}",
                sampling.press_threshold
            )));
        }
        if sampling.refresh_hz == 0 {
            return Err(ConfigError::Invalid(
                "sampling.refresh_hz must be positive".to_string(),
            ));
        }
        if !(self.volume.step > 0.0 && self.volume.step <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "volume.step must be in (0, 1], got {}",
                self.volume.step
            )));
        }

        let throttle = &self.throttle;
        let windows = [
            ("navigation_ms", throttle.navigation_ms),
            ("button_ms", throttle.button_ms),
            ("media_ms", throttle.media_ms),
            ("seek_ms", throttle.seek_ms),
            ("volume_ms", throttle.volume_ms),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid(format!(
                "throttle.{} must be positive",
                name
            )));
        }

        if self.dispatch.capacity == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
