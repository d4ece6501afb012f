//! Progression Configuration
//!
//! Loaded from a TOML file; every field has a default.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::quest::BarrierSettings;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Root data directory; quest files live in `<data_dir>/quests`
    pub data_dir: PathBuf,
    /// Tracing filter used when RUST_LOG is unset
    pub log_filter: String,
    /// Seconds per simulated frame
    pub tick_interval: f32,
    /// Upper bound on simulated frames per quest
    pub max_ticks: u32,
    /// Barrier applied to tasks without their own
    pub default_barrier: BarrierSettings,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_filter: "questline=info".to_string(),
            tick_interval: 0.05, // 20 Hz
            max_ticks: 72_000,
            default_barrier: BarrierSettings::default(),
        }
    }
}

impl ProgressionConfig {
    /// Load config from a TOML file; relative `data_dir` resolves against the file's directory
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        let mut config = Self::from_toml_str(&content)
            .map_err(|e| format!("{:?}: {}", path, e))?;

        if config.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.data_dir = parent.join(&config.data_dir);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let config: Self =
            toml::from_str(content).map_err(|e| format!("Failed to parse config: {}", e))?;

        if !config.tick_interval.is_finite() || config.tick_interval <= 0.0 {
            return Err(format!("tick_interval must be positive, got {}", config.tick_interval));
        }
        if !config.default_barrier.time.is_finite() || config.default_barrier.time < 0.0 {
            return Err(format!(
                "default_barrier.time must be non-negative, got {}",
                config.default_barrier.time
            ));
        }
        Ok(config)
    }
}
