//! Fixed-capacity storage for the most recent accepted frame.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Capacity of the last-good-frame buffer for a 1024x1280 RGB sensor.
///
/// A frame must be strictly shorter than this to be accepted.
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 3_932_160;

/// Reasons a delivered frame is classified as bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameRejection {
    /// The driver signalled a bad frame with a zero length.
    #[error("empty frame")]
    Empty,
    /// The frame does not fit below the buffer capacity.
    #[error("frame of {len} bytes exceeds capacity {capacity}")]
    Oversized {
        /// Delivered length.
        len: usize,
        /// Buffer capacity.
        capacity: usize,
    },
}

/// Classifies a frame length against `capacity`.
///
/// Valid lengths are `1..capacity`; `capacity` itself is rejected.
pub fn classify(len: usize, capacity: usize) -> Result<(), FrameRejection> {
    if len == 0 {
        Err(FrameRejection::Empty)
    } else if len >= capacity {
        Err(FrameRejection::Oversized { len, capacity })
    } else {
        Ok(())
    }
}

/// Preallocated frame buffer with a bounded copy.
///
/// Bytes only enter through [`FrameBuffer::store`], which classifies the
/// input before touching the storage.
pub struct FrameBuffer {
    bytes: Box<[u8]>,
    len: usize,
    stored_at: Option<DateTime<Utc>>,
}

impl FrameBuffer {
    /// Allocates a buffer of `capacity` bytes up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            stored_at: None,
        }
    }

    /// Copies `frame` to offset 0 if it classifies as valid.
    ///
    /// On rejection the length drops to 0 and the previous bytes are left
    /// in place but no longer count as current.
    pub fn store(&mut self, frame: &[u8]) -> Result<usize, FrameRejection> {
        if let Err(rejection) = classify(frame.len(), self.capacity()) {
            self.len = 0;
            return Err(rejection);
        }
        self.bytes[..frame.len()].copy_from_slice(frame);
        self.len = frame.len();
        self.stored_at = Some(Utc::now());
        Ok(self.len)
    }

    /// Bytes of the current frame; empty when the latest frame was rejected.
    #[inline]
    pub fn current(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Length of the current frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there is no current frame.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated size; accepted frames are strictly shorter.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// When the current frame was copied in.
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        if self.len == 0 {
            None
        } else {
            self.stored_at
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.len)
            .field("capacity", &self.bytes.len())
            .field("stored_at", &self.stored_at)
            .finish()
    }
}
