//! Controller configuration.
//!
//! Defaults reproduce the vendor's recommended setup for the 1024x768
//! mode: 20 MHz sensor clock, bad frames delivered as zero-length
//! callbacks, fixed exposure and image-quality settings.

use super::settings::{Setting, DEFAULT_SETTINGS, DIAGNOSTIC_PARAMS};
use crate::sdk::{CameraIndex, FrameFormat, ParamId};
use crate::sink::DEFAULT_MAX_IMAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest frame buffer the controller agrees to allocate.
pub const MAX_SUPPORTED_IMAGE_SIZE: usize = DEFAULT_MAX_IMAGE_SIZE * 10;

/// Configuration for [`CameraController`](super::CameraController).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// SDK index of the managed camera.
    pub camera_index: CameraIndex,
    /// Sensor clock in MHz.
    pub pll_mhz: u32,
    /// Ask the driver to deliver bad frames as zero-length callbacks.
    pub bad_frame_delivery: bool,
    /// Pixel layout requested for the frame callback.
    pub frame_format: FrameFormat,
    /// SDK acquisition mode (4 selects 1024x768).
    pub mode: u32,
    /// Image settings applied in order after the mode is selected.
    pub settings: Vec<Setting>,
    /// Capacity of the last-good-frame buffer in bytes.
    pub max_image_size: usize,
    /// Have the SDK write every good frame to `live_image_path`.
    pub persist_live_image: bool,
    /// Target of the live image written for each good frame.
    pub live_image_path: PathBuf,
    /// Log parameter ranges after a successful `init`.
    pub dump_parameters: bool,
    /// Parameters reported by the dump.
    pub diagnostic_params: Vec<ParamId>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            camera_index: CameraIndex(0),
            pll_mhz: 20,
            bad_frame_delivery: true,
            frame_format: FrameFormat::Rgb,
            mode: 4,
            settings: DEFAULT_SETTINGS.to_vec(),
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            persist_live_image: true,
            live_image_path: PathBuf::from("live_image.bmp"),
            dump_parameters: true,
            diagnostic_params: DIAGNOSTIC_PARAMS.to_vec(),
        }
    }
}

impl ControllerConfig {
    /// Path the sink persists good frames to, if enabled.
    pub fn live_image(&self) -> Option<PathBuf> {
        self.persist_live_image.then(|| self.live_image_path.clone())
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_image_size == 0 || self.max_image_size > MAX_SUPPORTED_IMAGE_SIZE {
            return Err(ConfigError::InvalidCapacity {
                size: self.max_image_size,
                max: MAX_SUPPORTED_IMAGE_SIZE,
            });
        }
        if self.persist_live_image && self.live_image_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLivePath);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Frame buffer capacity out of range.
    #[error("invalid frame buffer capacity {size} (must be 1-{max} bytes)")]
    InvalidCapacity {
        /// Configured capacity.
        size: usize,
        /// Largest supported capacity.
        max: usize,
    },
    /// Live image persistence needs a path.
    #[error("live image persistence enabled without a path")]
    EmptyLivePath,
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The config file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[camera]` table.
    #[serde(default)]
    pub camera: ControllerConfig,
    /// `[metrics]` table.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.camera.validate()?;
        Ok(config)
    }
}
