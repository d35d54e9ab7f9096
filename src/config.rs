//! Configuration management for Repcam
//!
//! Handles loading and parsing of the YAML configuration file. Every field
//! has a default, so a missing file simply yields the default configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub counting: CountingConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Webcam configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    /// Device index passed to the capture backend
    #[serde(default = "default_camera_device")]
    pub device: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

/// Pose classifier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Where the trained model is persisted (OpenCV YAML serialization)
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// Side length of the square grayscale thumbnail the model operates on
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
}

/// Counting loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CountingConfig {
    /// Tick interval of the grab→predict→update loop, in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Whether counting is enabled at startup
    #[serde(default)]
    pub start_enabled: bool,
}

/// Training sample storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Root directory for the per-class sample folders
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_camera_device() -> i32 {
    0
}

fn default_camera_width() -> u32 {
    640
}

fn default_camera_height() -> u32 {
    480
}

fn default_model_path() -> String {
    "model.yml".to_string()
}

fn default_sample_size() -> u32 {
    150
}

fn default_tick_ms() -> u64 {
    15
}

fn default_data_dir() -> String {
    "training_data".to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: default_camera_device(),
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            sample_size: default_sample_size(),
        }
    }
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            start_enabled: false,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file is not an error: the defaults cover every field, so the
    /// application can run without any configuration on disk. A file that
    /// exists but fails to parse is a startup error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.camera.device, 0);
        assert_eq!(config.classifier.sample_size, 150);
        assert_eq!(config.counting.tick_ms, 15);
        assert!(!config.counting.start_enabled);
        assert_eq!(config.capture.data_dir, "training_data");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
camera:
  device: 2
counting:
  start_enabled: true
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.camera.device, 2);
        assert_eq!(config.camera.width, 640);
        assert!(config.counting.start_enabled);
        assert_eq!(config.counting.tick_ms, 15);
        assert_eq!(config.classifier.model_path, "model.yml");
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let config = AppConfig::load("definitely/not/here.yaml").await.unwrap();
        assert_eq!(config.capture.data_dir, "training_data");
    }
}
