//! # Configuration
//!
//! TOML-backed settings for point cloud creation and modifier evaluation.
//!
//! ```toml
//! [pointcloud]
//! default_point_count = 400
//! random_seed = 0
//!
//! [evaluation]
//! mode = "render"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modifier::EvalMode;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Settings for generated point clouds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PointCloudConfig {
    /// Number of points in a random default cloud
    pub default_point_count: usize,
    /// Seed for the random default cloud
    pub random_seed: u64,
    /// Upper bound of the random per-point radius
    pub max_random_radius: f32,
}

impl Default for PointCloudConfig {
    fn default() -> Self {
        Self {
            default_point_count: 400,
            random_seed: 0,
            max_random_radius: 0.05,
        }
    }
}

/// Settings for modifier evaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    pub mode: EvalMode,
    /// Log how long each modifier took
    pub log_stage_timings: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            mode: EvalMode::Viewport,
            log_stage_timings: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pointcloud: PointCloudConfig,
    pub evaluation: EvaluationConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let radius = self.pointcloud.max_random_radius;
        if !radius.is_finite() || radius < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pointcloud.max_random_radius must be a non-negative number, got {}",
                radius
            )));
        }
        Ok(())
    }
}
