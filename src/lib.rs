//! NET iCube USB camera control.
//!
//! Orchestrates a single USB camera on top of the vendor SDK: runs the
//! configuration sequence, installs the frame callback, tracks good and
//! bad frames, and exposes a small command surface to the application.
//!
//! # Architecture
//!
//! ```text
//! application ──commands──> control ──calls──> sdk (vendor library)
//!                              │                  │
//!                              │ reads            │ frame callback
//!                              v                  v  (driver thread)
//!                             sink <──────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Fail-fast init**: the first failing configuration step aborts `init`
//!   and leaves the camera unconfigured
//! - **Bounded memory**: the last-good-frame buffer is allocated once and
//!   oversized frames are rejected, never truncated
//! - **Absorb bad frames**: malformed frames only move counters; they never
//!   surface as errors or end a session
//!
//! # Example
//!
//! ```no_run
//! use icube_control::{CameraApi, CameraController, ControllerConfig, MockSdk};
//! use std::sync::Arc;
//!
//! let sdk = Arc::new(MockSdk::new());
//! let controller = CameraController::new(sdk, ControllerConfig::default()).unwrap();
//! let mut api = CameraApi::new(controller);
//!
//! if api.init() == 1 && api.start() == 1 {
//!     println!("good: {}, bad: {}", api.good_image_count(), api.bad_image_count());
//!     api.stop();
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod api;
pub mod control;
pub mod metrics;
pub mod sdk;
pub mod sink;

// Re-export commonly used types at crate root
pub use api::CameraApi;
pub use control::{CameraController, ControllerConfig, ControllerError, FileConfig, SessionState};
pub use sdk::{CameraIndex, CameraSdk, MockSdk, ParamId, SdkError};
pub use sink::{FrameCounts, FrameSink, DEFAULT_MAX_IMAGE_SIZE};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
