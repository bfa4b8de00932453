//! The call surface the controller needs from the vendor SDK.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Acknowledgment returned to the SDK after every frame callback.
///
/// It only tells the driver the callback ran; it carries no verdict
/// about the frame itself.
pub const FRAME_ACK: i32 = 0;

/// Index of a camera as enumerated by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraIndex(pub u32);

impl fmt::Display for CameraIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cam{}", self.0)
    }
}

/// Camera parameters the controller reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    /// Sensor readout timing.
    SensorTiming,
    /// Mirror image left to right.
    FlipHorizontal,
    /// Mirror image top to bottom.
    FlipVertical,
    /// Analog gain.
    Gain,
    /// Sensor clock in MHz.
    Pll,
    /// Digital brightness offset.
    Brightness,
    /// Digital contrast.
    Contrast,
    /// Gamma correction.
    Gamma,
    /// Sensor black level.
    BlackLevel,
    /// When set, bad frames reach the callback with a zero length.
    BadFrameDelivery,
}

impl ParamId {
    /// Stable name used in logs and config files.
    pub fn name(self) -> &'static str {
        match self {
            Self::SensorTiming => "sensor_timing",
            Self::FlipHorizontal => "flip_horizontal",
            Self::FlipVertical => "flip_vertical",
            Self::Gain => "gain",
            Self::Pll => "pll",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Gamma => "gamma",
            Self::BlackLevel => "black_level",
            Self::BadFrameDelivery => "bad_frame_delivery",
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Range information the SDK reports for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamRange {
    /// Smallest accepted value.
    pub min: u32,
    /// Largest accepted value.
    pub max: u32,
    /// Value after power-up.
    pub default: u32,
}

/// Pixel layout of frames handed to the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    /// Debayered 24-bit RGB.
    #[default]
    Rgb,
    /// Sensor data before debayering.
    Raw,
}

/// Frame delivery callback.
///
/// Invoked from a driver-owned thread. The slice is only valid for the
/// duration of the call; anything kept must be copied out.
pub type FrameCallback = Arc<dyn Fn(&[u8]) -> i32 + Send + Sync>;

/// Errors reported by the SDK boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    /// No camera at the requested index.
    #[error("no camera found")]
    NoDevice,
    /// The call needs an open handle.
    #[error("camera {0} is not open")]
    NotOpen(CameraIndex),
    /// Raw vendor status code of a failed call.
    #[error("SDK call failed with status {0}")]
    Status(i32),
    /// Reading or writing a file failed.
    #[error("SDK I/O failure: {0}")]
    Io(String),
}

/// Result alias for SDK calls.
pub type SdkResult<T> = Result<T, SdkError>;

/// Calls the controller makes into the vendor SDK.
///
/// All methods take `&self`: the SDK object is shared between the
/// controller and the frame sink, and the vendor library serializes
/// access internally.
pub trait CameraSdk: Send + Sync + 'static {
    /// Enumerates attached cameras and returns how many were found.
    fn discover(&self) -> SdkResult<usize>;

    /// Opens the device handle.
    fn open(&self, index: CameraIndex) -> SdkResult<()>;

    /// Closes the device handle and drops the registered callback.
    fn close(&self, index: CameraIndex) -> SdkResult<()>;

    /// Writes a camera parameter.
    fn set_parameter(&self, index: CameraIndex, param: ParamId, value: u32) -> SdkResult<()>;

    /// Reads a camera parameter.
    fn parameter(&self, index: CameraIndex, param: ParamId) -> SdkResult<u32>;

    /// Reads the accepted range of a camera parameter.
    fn parameter_range(&self, index: CameraIndex, param: ParamId) -> SdkResult<ParamRange>;

    /// Installs the callback that receives every delivered frame.
    fn register_frame_callback(
        &self,
        index: CameraIndex,
        format: FrameFormat,
        callback: FrameCallback,
    ) -> SdkResult<()>;

    /// Selects the acquisition resolution/mode.
    fn set_mode(&self, index: CameraIndex, mode: u32) -> SdkResult<()>;

    /// Sets the exposure time.
    fn set_exposure(&self, index: CameraIndex, milliseconds: u32) -> SdkResult<()>;

    /// Begins streaming frames to the registered callback.
    fn start(&self, index: CameraIndex) -> SdkResult<()>;

    /// Halts streaming; no callback runs after this returns.
    fn stop(&self, index: CameraIndex) -> SdkResult<()>;

    /// Writes the device's most recent frame to `path`.
    fn save_to_file(&self, index: CameraIndex, path: &Path) -> SdkResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_names_round_trip_through_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            param: ParamId,
        }

        let parsed: Wrapper = toml::from_str(r#"param = "black_level""#).unwrap();
        assert_eq!(parsed.param, ParamId::BlackLevel);
        assert_eq!(parsed.param.to_string(), "black_level");
    }

    #[test]
    fn test_sdk_error_display() {
        assert_eq!(SdkError::Status(-3).to_string(), "SDK call failed with status -3");
        assert_eq!(
            SdkError::NotOpen(CameraIndex(1)).to_string(),
            "camera cam1 is not open"
        );
    }
}
