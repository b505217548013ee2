//! Configuration loading and persistence
//!
//! YAML config at `~/.config/stemdrive/config.yaml`. Loading never
//! fails the program: a missing or malformed file logs a warning and
//! falls back to defaults, so a bad edit can't brick startup.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::audio::OutputConfig;
use crate::gain::{DriveLimits, DEFAULT_MAX_RPM, DEFAULT_MAX_SPEED};

/// Default control loop rate in Hz
pub const DEFAULT_CONTROL_RATE_HZ: u32 = 30;

/// Drive curve and control loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Speed that maps to the top of the speed-driven curves
    pub max_speed: f32,
    /// RPM that maps to full bass gain
    pub max_rpm: f32,
    /// Telemetry sampling / gain publication rate
    pub control_rate_hz: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            max_rpm: DEFAULT_MAX_RPM,
            control_rate_hz: DEFAULT_CONTROL_RATE_HZ,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub drive: DriveConfig,
    pub audio: OutputConfig,
    /// Directory holding the four stem files
    pub stem_dir: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            drive: DriveConfig::default(),
            audio: OutputConfig::default(),
            stem_dir: PathBuf::from("wavs"),
        }
    }
}

impl SimConfig {
    /// Validate ranges that serde can't express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.drive.max_speed <= 0.0 {
            anyhow::bail!("drive.max_speed must be positive (got {})", self.drive.max_speed);
        }
        if self.drive.max_rpm <= 0.0 {
            anyhow::bail!("drive.max_rpm must be positive (got {})", self.drive.max_rpm);
        }
        if !(1..=240).contains(&self.drive.control_rate_hz) {
            anyhow::bail!(
                "drive.control_rate_hz must be 1..=240 (got {})",
                self.drive.control_rate_hz
            );
        }
        Ok(())
    }

    /// Drive limits for the gain mapping
    ///
    /// Call [`validate`](Self::validate) first: `DriveLimits::new`
    /// asserts positive ceilings.
    pub fn limits(&self) -> DriveLimits {
        DriveLimits::new(self.drive.max_speed, self.drive.max_rpm)
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stemdrive").join("config.yaml"))
}

/// Load config from `path`, falling back to defaults on any problem
pub fn load_config(path: &Path) -> SimConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_yaml::from_str::<SimConfig>(&text) {
            Ok(config) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!(
                    "config at {} is invalid ({err}), using defaults",
                    path.display()
                );
                SimConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!("no config at {}, using defaults", path.display());
            SimConfig::default()
        }
        Err(err) => {
            log::warn!("cannot read config at {} ({err}), using defaults", path.display());
            SimConfig::default()
        }
    }
}

/// Write config to `path`, creating parent directories as needed
pub fn save_config(config: &SimConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let text = serde_yaml::to_string(config).context("serializing config")?;
    std::fs::write(path, text).with_context(|| format!("writing config to {}", path.display()))?;
    Ok(())
}
