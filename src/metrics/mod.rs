//! Prometheus metrics exporter for camera monitoring.
//!
//! # Metrics Exposed
//!
//! - `icube_frames_good_total` - Frames accepted since process start
//! - `icube_frames_bad_total` - Frames rejected as empty or oversized
//! - `icube_last_frame_bytes` - Length of the current frame (0 after a rejection)
//! - `icube_frame_buffer_capacity_bytes` - Capacity of the last-good-frame buffer
//! - `icube_session_state` - Controller state code
//!
//! # Example
//!
//! ```no_run
//! use icube_control::control::SessionState;
//! use icube_control::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     good_frames: 120,
//!     bad_frames: 3,
//!     last_frame_bytes: 2_359_296,
//!     buffer_capacity: 3_932_160,
//!     session_state: SessionState::Running,
//! };
//!
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
