//! Camera lifecycle control.
//!
//! The controller owns the session state machine, runs the ordered
//! configuration sequence against the SDK, and wires the frame sink in as
//! the SDK's frame callback.

mod config;
mod controller;
mod settings;
mod state;

pub use config::{ConfigError, ControllerConfig, FileConfig, MetricsConfig, MAX_SUPPORTED_IMAGE_SIZE};
pub use controller::{CameraController, ControllerError, InitStep};
pub use settings::{dump_parameters, Setting, DEFAULT_SETTINGS, DIAGNOSTIC_PARAMS};
pub use state::{Command, SessionState};
