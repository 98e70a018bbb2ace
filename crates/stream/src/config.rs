use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// How the live window picks panels to retire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Admitting index `k` retires index `k - window_size` if it is live, then
    /// the oldest live panels until the window fits.
    #[default]
    CreationLag,
    /// Retire the oldest live panels until the window fits.
    OldestLive,
}

impl FromStr for EvictionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creation_lag" | "creation-lag" => Ok(Self::CreationLag),
            "oldest_live" | "oldest-live" => Ok(Self::OldestLive),
            other => Err(ConfigError::Invalid(format!(
                "unknown eviction policy {other:?}"
            ))),
        }
    }
}

/// Errors from loading or validating a [`StreamConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Panel stream configuration. Missing YAML keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Spacing between consecutive panel anchors.
    pub pitch: f64,
    /// Distance from the previous spawn threshold to the new panel's anchor.
    pub anchor_advance: f64,
    /// Maximum number of live panels.
    pub window_size: usize,
    /// Size of the image set (`img-1.jpg ..= img-<n>.jpg`).
    pub image_count: u32,
    /// Decorative cones per panel.
    pub shape_count: usize,
    /// Longest side of the fitted photo.
    pub image_max_dimension: f64,
    /// Camera X advance per frame.
    pub camera_step: f64,
    /// Prefix for image URLs.
    pub base_url: String,
    pub eviction: EvictionPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pitch: 150.0,
            anchor_advance: 300.0,
            window_size: 4,
            image_count: 12,
            shape_count: 40,
            image_max_dimension: 37.0,
            camera_step: 0.2,
            base_url: String::new(),
            eviction: EvictionPolicy::CreationLag,
        }
    }
}

impl StreamConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be at least 1".into()));
        }
        if self.image_count == 0 {
            return Err(ConfigError::Invalid("image_count must be at least 1".into()));
        }
        if !positive(self.pitch) {
            return Err(ConfigError::Invalid("pitch must be positive".into()));
        }
        if !positive(self.anchor_advance - self.pitch) {
            return Err(ConfigError::Invalid(
                "anchor_advance must exceed pitch".into(),
            ));
        }
        if !positive(self.camera_step) {
            return Err(ConfigError::Invalid("camera_step must be positive".into()));
        }
        if !positive(self.image_max_dimension) {
            return Err(ConfigError::Invalid(
                "image_max_dimension must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v > 0.0
}
