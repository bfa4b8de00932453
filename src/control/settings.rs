//! Ordered image-quality settings and the parameter diagnostic dump.

use crate::sdk::{CameraIndex, CameraSdk, ParamId, SdkResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One image-quality setting applied during `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Setting {
    /// Write a camera parameter.
    Parameter {
        /// Target parameter.
        param: ParamId,
        /// Value written.
        value: u32,
    },
    /// Set the exposure time, which the SDK exposes as its own call.
    Exposure {
        /// Exposure time.
        milliseconds: u32,
    },
}

impl Setting {
    /// Shorthand for [`Setting::Parameter`].
    pub const fn param(param: ParamId, value: u32) -> Self {
        Self::Parameter { param, value }
    }

    /// Sends the setting to the SDK.
    pub fn apply<S: CameraSdk + ?Sized>(&self, sdk: &S, index: CameraIndex) -> SdkResult<()> {
        match *self {
            Self::Parameter { param, value } => sdk.set_parameter(index, param, value),
            Self::Exposure { milliseconds } => sdk.set_exposure(index, milliseconds),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter { param, value } => write!(f, "{param}={value}"),
            Self::Exposure { milliseconds } => write!(f, "exposure={milliseconds}ms"),
        }
    }
}

/// Default image settings, applied in this order.
pub const DEFAULT_SETTINGS: [Setting; 7] = [
    Setting::param(ParamId::FlipVertical, 1),
    Setting::param(ParamId::Gain, 0),
    Setting::Exposure { milliseconds: 300 },
    Setting::param(ParamId::Brightness, 128),
    Setting::param(ParamId::Contrast, 256),
    Setting::param(ParamId::Gamma, 56),
    Setting::param(ParamId::BlackLevel, 128),
];

/// Parameters reported by the diagnostic dump after `init`.
pub const DIAGNOSTIC_PARAMS: [ParamId; 8] = [
    ParamId::SensorTiming,
    ParamId::FlipHorizontal,
    ParamId::Gain,
    ParamId::Pll,
    ParamId::Brightness,
    ParamId::Gamma,
    ParamId::Contrast,
    ParamId::BlackLevel,
];

/// Logs current value and range for each parameter in `params`.
///
/// Read failures are logged and skipped.
pub fn dump_parameters<S: CameraSdk + ?Sized>(sdk: &S, index: CameraIndex, params: &[ParamId]) {
    for &param in params {
        let current = sdk.parameter(index, param);
        let range = sdk.parameter_range(index, param);
        match (current, range) {
            (Ok(current), Ok(range)) => tracing::info!(
                %param,
                current,
                min = range.min,
                max = range.max,
                default = range.default,
                "Camera parameter"
            ),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(%param, error = %e, "Failed to read camera parameter")
            }
        }
    }
}
