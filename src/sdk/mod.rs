//! Vendor SDK boundary.
//!
//! Sensor control, USB transport and on-device encoding belong to the
//! vendor SDK. This module only describes the calls the controller makes
//! into it, so the rest of the crate can be driven by the real library
//! or by the in-process [`MockSdk`].

mod boundary;
pub mod mock;

pub use boundary::{
    CameraIndex, CameraSdk, FrameCallback, FrameFormat, ParamId, ParamRange, SdkError,
    SdkResult, FRAME_ACK,
};
pub use mock::{MockSdk, SdkCall};
