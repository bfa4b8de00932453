//! Frame delivery sink.
//!
//! Receives every frame the SDK delivers, classifies it by length, keeps
//! good/bad counters and a copy of the most recent good frame.

mod buffer;
mod frame_sink;

pub use buffer::{classify, FrameBuffer, FrameRejection, DEFAULT_MAX_IMAGE_SIZE};
pub use frame_sink::{FrameCounts, FrameSink, FrameSnapshot};
