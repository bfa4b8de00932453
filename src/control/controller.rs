//! Camera lifecycle controller.

use super::config::{ConfigError, ControllerConfig};
use super::settings::{dump_parameters, Setting};
use super::state::{Command, SessionState};
use crate::sdk::{CameraSdk, ParamId, SdkError, SdkResult};
use crate::sink::{FrameCounts, FrameSink};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Steps of the `init` sequence, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// Enumerate attached cameras.
    Discover,
    /// Open the device handle.
    Open,
    /// Set the sensor clock.
    Clock,
    /// Enable zero-length delivery of bad frames.
    BadFrameDelivery,
    /// Install the frame sink as callback.
    RegisterCallback,
    /// Select the acquisition mode.
    Mode,
    /// Apply one image setting.
    Setting(Setting),
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discover => f.write_str("discover"),
            Self::Open => f.write_str("open"),
            Self::Clock => f.write_str("clock"),
            Self::BadFrameDelivery => f.write_str("bad_frame_delivery"),
            Self::RegisterCallback => f.write_str("register_callback"),
            Self::Mode => f.write_str("mode"),
            Self::Setting(setting) => write!(f, "setting {setting}"),
        }
    }
}

/// Errors returned by controller commands.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Discovery found no camera.
    #[error("no camera found")]
    DeviceNotFound,
    /// An `init` step failed; later steps did not run.
    #[error("init step {step} failed: {source}")]
    StepFailed {
        /// The failing step.
        step: InitStep,
        /// SDK error of the step.
        source: SdkError,
    },
    /// The command is not valid in the current state; nothing was called.
    #[error("{command} is not allowed while {state}")]
    InvalidState {
        /// Rejected command.
        command: Command,
        /// State at the time of the call.
        state: SessionState,
    },
    /// The SDK rejected a command.
    #[error("{command} failed: {source}")]
    Sdk {
        /// Command that failed.
        command: Command,
        /// SDK error.
        source: SdkError,
    },
    /// Negative exposure time.
    #[error("invalid exposure {0} ms")]
    InvalidExposure(i32),
    /// Path that cannot be passed to the SDK.
    #[error("invalid save path: {0:?}")]
    InvalidPath(String),
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Drives one camera through its lifecycle.
///
/// Commands run synchronously on the caller's thread. Frames arrive on the
/// SDK's delivery thread and go straight to the shared [`FrameSink`]; the
/// controller only reads the sink's counters.
pub struct CameraController<S: CameraSdk> {
    sdk: Arc<S>,
    config: ControllerConfig,
    sink: Arc<FrameSink<S>>,
    state: SessionState,
}

impl<S: CameraSdk> CameraController<S> {
    /// Creates a controller in the `Uninitialized` state.
    pub fn new(sdk: Arc<S>, config: ControllerConfig) -> Result<Self, ControllerError> {
        config.validate()?;
        let sink = Arc::new(FrameSink::new(
            &sdk,
            config.camera_index,
            config.max_image_size,
            config.live_image(),
        ));
        Ok(Self {
            sdk,
            config,
            sink,
            state: SessionState::Uninitialized,
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Configuration the controller was built with.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Frame sink registered as the SDK callback.
    pub fn sink(&self) -> &Arc<FrameSink<S>> {
        &self.sink
    }

    /// The SDK the controller drives.
    pub fn sdk(&self) -> &Arc<S> {
        &self.sdk
    }

    /// Good and bad frame counts.
    pub fn counts(&self) -> FrameCounts {
        self.sink.counts()
    }

    fn require(&self, command: Command) -> Result<(), ControllerError> {
        if command.is_allowed(self.state) {
            Ok(())
        } else {
            tracing::warn!(%command, state = %self.state, "Command rejected");
            Err(ControllerError::InvalidState {
                command,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            tracing::info!(from = %self.state, to = %to, "Camera state changed");
            self.state = to;
        }
    }

    /// Discovers, opens and configures the camera.
    ///
    /// Steps run strictly in order and the first failure aborts the rest.
    /// Steps that already succeeded are not undone; the state ends up
    /// `Uninitialized` either way unless every step succeeded.
    pub fn init(&mut self) -> Result<(), ControllerError> {
        self.require(Command::Init)?;

        if let Err(e) = self.configure() {
            tracing::warn!(error = %e, "Camera init failed");
            self.transition(SessionState::Uninitialized);
            return Err(e);
        }

        self.transition(SessionState::Configured);
        if self.config.dump_parameters {
            dump_parameters(
                &*self.sdk,
                self.config.camera_index,
                &self.config.diagnostic_params,
            );
        }
        Ok(())
    }

    fn configure(&self) -> Result<(), ControllerError> {
        let index = self.config.camera_index;
        let sdk = &*self.sdk;

        let found = run_step(InitStep::Discover, || sdk.discover())?;
        if found == 0 {
            return Err(ControllerError::DeviceNotFound);
        }
        tracing::debug!(found, "Cameras discovered");

        run_step(InitStep::Open, || sdk.open(index))?;
        run_step(InitStep::Clock, || {
            sdk.set_parameter(index, ParamId::Pll, self.config.pll_mhz)
        })?;
        run_step(InitStep::BadFrameDelivery, || {
            let enabled = u32::from(self.config.bad_frame_delivery);
            sdk.set_parameter(index, ParamId::BadFrameDelivery, enabled)
        })?;
        run_step(InitStep::RegisterCallback, || {
            sdk.register_frame_callback(index, self.config.frame_format, self.sink.callback())
        })?;
        run_step(InitStep::Mode, || sdk.set_mode(index, self.config.mode))?;

        for setting in &self.config.settings {
            run_step(InitStep::Setting(*setting), || setting.apply(sdk, index))?;
        }
        Ok(())
    }

    /// Begins streaming. On failure the camera stays `Configured`.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        self.require(Command::Start)?;
        self.sdk
            .start(self.config.camera_index)
            .map_err(|source| sdk_failure(Command::Start, source))?;
        self.transition(SessionState::Running);
        Ok(())
    }

    /// Halts streaming, then closes the device handle.
    ///
    /// If halting fails the camera stays `Running`. If halting succeeds but
    /// closing fails the camera moves to `Halted`, and a later `stop` only
    /// retries the close.
    pub fn stop(&mut self) -> Result<(), ControllerError> {
        self.require(Command::Stop)?;
        let index = self.config.camera_index;

        if self.state == SessionState::Running {
            self.sdk
                .stop(index)
                .map_err(|source| sdk_failure(Command::Stop, source))?;
            self.transition(SessionState::Halted);
        }

        self.sdk
            .close(index)
            .map_err(|source| sdk_failure(Command::Stop, source))?;
        self.transition(SessionState::Stopped);
        Ok(())
    }

    /// Passes an exposure time straight to the SDK.
    pub fn set_exposure(&mut self, milliseconds: u32) -> Result<(), ControllerError> {
        self.require(Command::SetExposure)?;
        self.sdk
            .set_exposure(self.config.camera_index, milliseconds)
            .map_err(|source| sdk_failure(Command::SetExposure, source))?;
        tracing::debug!(milliseconds, "Exposure updated");
        Ok(())
    }

    /// Has the SDK write the device's last frame to `path`.
    pub fn save_frame(&self, path: &Path) -> Result<(), ControllerError> {
        self.require(Command::SaveFrame)?;
        self.sink
            .save_current_frame(path)
            .map_err(|source| sdk_failure(Command::SaveFrame, source))?;
        tracing::info!(path = %path.display(), "Saved frame");
        Ok(())
    }
}

impl<S: CameraSdk> Drop for CameraController<S> {
    /// Halts streaming and closes the handle if the session still holds it.
    fn drop(&mut self) {
        if !self.state.handle_open() {
            return;
        }
        let index = self.config.camera_index;
        if self.state == SessionState::Running {
            if let Err(e) = self.sdk.stop(index) {
                tracing::warn!(error = %e, "Failed to halt streaming while dropping controller");
            }
        }
        match self.sdk.close(index) {
            Ok(()) => tracing::info!(state = %self.state, "Camera released on drop"),
            Err(e) => tracing::warn!(error = %e, "Failed to close camera while dropping controller"),
        }
    }
}

fn run_step<T>(step: InitStep, call: impl FnOnce() -> SdkResult<T>) -> Result<T, ControllerError> {
    tracing::debug!(%step, "Running init step");
    call().map_err(|source| ControllerError::StepFailed { step, source })
}

fn sdk_failure(command: Command, source: SdkError) -> ControllerError {
    tracing::warn!(%command, error = %source, "SDK call failed");
    ControllerError::Sdk { command, source }
}
