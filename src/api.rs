//! Integer command surface for calling applications.
//!
//! Every command reports `1` for success and `0` for failure. The reason
//! for a failure is logged, and the full error stays reachable through
//! [`CameraApi::controller`].

use crate::control::{CameraController, ControllerError};
use crate::sdk::CameraSdk;
use std::path::Path;

/// Returned by a command that succeeded.
pub const SUCCESS: i32 = 1;
/// Returned by a command that failed.
pub const FAILURE: i32 = 0;

/// Command facade over a [`CameraController`].
pub struct CameraApi<S: CameraSdk> {
    controller: CameraController<S>,
}

impl<S: CameraSdk> CameraApi<S> {
    /// Wraps `controller`.
    pub fn new(controller: CameraController<S>) -> Self {
        Self { controller }
    }

    /// The wrapped controller, for state and detailed errors.
    pub fn controller(&self) -> &CameraController<S> {
        &self.controller
    }

    /// Mutable access to the wrapped controller.
    pub fn controller_mut(&mut self) -> &mut CameraController<S> {
        &mut self.controller
    }

    /// Discovers, opens and configures the camera.
    pub fn init(&mut self) -> i32 {
        status(self.controller.init())
    }

    /// Starts streaming.
    pub fn start(&mut self) -> i32 {
        status(self.controller.start())
    }

    /// Halts streaming and closes the camera.
    pub fn stop(&mut self) -> i32 {
        status(self.controller.stop())
    }

    /// Frames accepted so far.
    pub fn good_image_count(&self) -> i64 {
        saturate(self.controller.sink().good_count())
    }

    /// Frames rejected so far.
    pub fn bad_image_count(&self) -> i64 {
        saturate(self.controller.sink().bad_count())
    }

    /// Saves the device's last frame to `path`.
    ///
    /// Paths that cannot cross into the SDK (empty, or containing NUL) fail
    /// without reaching it.
    pub fn save_file(&self, path: &str) -> i32 {
        if path.is_empty() || path.contains('\0') {
            return status(Err(ControllerError::InvalidPath(path.to_owned())));
        }
        status(self.controller.save_frame(Path::new(path)))
    }

    /// Sets the exposure time; negative values fail without an SDK call.
    pub fn set_exposure(&mut self, milliseconds: i32) -> i32 {
        let result = u32::try_from(milliseconds)
            .map_err(|_| ControllerError::InvalidExposure(milliseconds))
            .and_then(|ms| self.controller.set_exposure(ms));
        status(result)
    }
}

fn status(result: Result<(), ControllerError>) -> i32 {
    match result {
        Ok(()) => SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "Command reported failure");
            FAILURE
        }
    }
}

fn saturate(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControllerConfig;
    use crate::sdk::{MockSdk, SdkCall, SdkError};
    use std::sync::Arc;

    fn api() -> (Arc<MockSdk>, CameraApi<MockSdk>) {
        let sdk = Arc::new(MockSdk::new());
        let config = ControllerConfig {
            persist_live_image: false,
            dump_parameters: false,
            ..Default::default()
        };
        let controller = CameraController::new(Arc::clone(&sdk), config).unwrap();
        (sdk, CameraApi::new(controller))
    }

    #[test]
    fn test_commands_report_one_and_zero() {
        let (sdk, mut api) = api();
        assert_eq!(api.start(), FAILURE);
        assert_eq!(api.init(), SUCCESS);
        assert_eq!(api.start(), SUCCESS);

        sdk.fail_on(SdkCall::Stop, SdkError::Status(1));
        assert_eq!(api.stop(), FAILURE);
        sdk.clear_failures();
        assert_eq!(api.stop(), SUCCESS);
    }

    #[test]
    fn test_counts_follow_sink() {
        let (sdk, mut api) = api();
        api.init();
        api.start();
        sdk.deliver(&[1, 2]);
        sdk.deliver(&[]);
        sdk.deliver(&[]);

        assert_eq!(api.good_image_count(), 1);
        assert_eq!(api.bad_image_count(), 2);
    }

    #[test]
    fn test_negative_exposure_fails_without_sdk_call() {
        let (sdk, mut api) = api();
        api.init();
        sdk.clear_calls();

        assert_eq!(api.set_exposure(-5), FAILURE);
        assert!(sdk.calls().is_empty());
        assert_eq!(api.set_exposure(300), SUCCESS);
    }

    #[test]
    fn test_exposure_before_init_fails() {
        let (sdk, mut api) = api();
        assert_eq!(api.set_exposure(300), FAILURE);
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn test_save_file_rejects_unusable_paths() {
        let (sdk, mut api) = api();
        api.init();
        sdk.clear_calls();

        assert_eq!(api.save_file(""), FAILURE);
        assert_eq!(api.save_file("bad\0name.bmp"), FAILURE);
        assert!(sdk.calls().is_empty());
    }
}
