//! Metrics collection and registry.

use crate::control::SessionState;
use crate::sdk::CameraSdk;
use crate::sink::FrameSink;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of camera session state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Frames accepted since process start.
    pub good_frames: u64,
    /// Frames rejected since process start.
    pub bad_frames: u64,
    /// Length of the current frame, 0 after a rejection.
    pub last_frame_bytes: usize,
    /// Capacity of the last-good-frame buffer.
    pub buffer_capacity: usize,
    /// Controller state.
    pub session_state: SessionState,
}

/// Prometheus metrics registry for camera monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    frames_good: IntCounter,
    frames_bad: IntCounter,
    last_frame_bytes: IntGauge,
    buffer_capacity: IntGauge,
    session_state: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all camera metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_good = IntCounter::new(
            "icube_frames_good_total",
            "Frames accepted into the last-good-frame buffer",
        )?;
        let frames_bad = IntCounter::new(
            "icube_frames_bad_total",
            "Frames rejected as empty or oversized",
        )?;
        let last_frame_bytes = IntGauge::new(
            "icube_last_frame_bytes",
            "Length of the current frame (0 after a rejected frame)",
        )?;
        let buffer_capacity = IntGauge::new(
            "icube_frame_buffer_capacity_bytes",
            "Capacity of the last-good-frame buffer",
        )?;
        let session_state = IntGauge::new(
            "icube_session_state",
            "Camera state (0=uninitialized, 1=configured, 2=running, 3=halted, 4=stopped)",
        )?;

        registry.register(Box::new(frames_good.clone()))?;
        registry.register(Box::new(frames_bad.clone()))?;
        registry.register(Box::new(last_frame_bytes.clone()))?;
        registry.register(Box::new(buffer_capacity.clone()))?;
        registry.register(Box::new(session_state.clone()))?;

        Ok(Self {
            registry,
            frames_good,
            frames_bad,
            last_frame_bytes,
            buffer_capacity,
            session_state,
        })
    }

    /// Updates all metrics from a snapshot of session state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // For counters, we need to increment by the difference
        let current_good = self.frames_good.get();
        if snapshot.good_frames > current_good {
            self.frames_good.inc_by(snapshot.good_frames - current_good);
        }
        let current_bad = self.frames_bad.get();
        if snapshot.bad_frames > current_bad {
            self.frames_bad.inc_by(snapshot.bad_frames - current_bad);
        }

        self.last_frame_bytes.set(gauge_value(snapshot.last_frame_bytes));
        self.buffer_capacity.set(gauge_value(snapshot.buffer_capacity));
        self.session_state.set(snapshot.session_state.code());
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn gauge_value(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

impl MetricsSnapshot {
    /// Creates a snapshot from the sink and the controller state.
    pub fn from_components<S: CameraSdk>(sink: &FrameSink<S>, state: SessionState) -> Self {
        let counts = sink.counts();
        Self {
            good_frames: counts.good,
            bad_frames: counts.bad,
            last_frame_bytes: sink.last_image_size(),
            buffer_capacity: sink.capacity(),
            session_state: state,
        }
    }
}
