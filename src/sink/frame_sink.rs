//! Frame classification and per-session accounting.

use super::buffer::{FrameBuffer, FrameRejection};
use crate::sdk::{CameraIndex, CameraSdk, FrameCallback, SdkError, SdkResult, FRAME_ACK};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Good/bad frame totals read at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounts {
    /// Frames accepted into the buffer.
    pub good: u64,
    /// Frames rejected as empty or oversized.
    pub bad: u64,
}

impl FrameCounts {
    /// Number of callback invocations these counts account for.
    pub fn total(&self) -> u64 {
        self.good + self.bad
    }
}

/// Copy of the last accepted frame.
#[derive(Clone)]
pub struct FrameSnapshot {
    bytes: Vec<u8>,
    received_at: DateTime<Utc>,
}

impl FrameSnapshot {
    /// Frame bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a snapshot taken from the sink.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// When the frame was copied into the sink.
    #[inline]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

impl std::fmt::Debug for FrameSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSnapshot")
            .field("bytes", &self.bytes.len())
            .field("received_at", &self.received_at)
            .finish()
    }
}

/// Consumes frames pushed by the SDK's delivery thread.
///
/// The delivery thread is the only writer. Counters are atomics so the
/// control thread can read them without locking. Frames go into two
/// preallocated buffers: the writer fills the back one and then publishes
/// it as the front, so a reader copying the front frame does not hold up
/// the next delivery. Each buffer keeps its bytes and length under one
/// mutex, so readers always see a matching pair.
///
/// The SDK is held weakly. The SDK owns the sink's callback, and a strong
/// reference back would keep both alive forever.
pub struct FrameSink<S: CameraSdk> {
    sdk: Weak<S>,
    index: CameraIndex,
    live_image_path: Option<PathBuf>,
    good: AtomicU64,
    bad: AtomicU64,
    buffers: [Mutex<FrameBuffer>; 2],
    front: AtomicUsize,
}

impl<S: CameraSdk> FrameSink<S> {
    /// Creates a sink whose buffers hold frames shorter than `capacity`.
    ///
    /// When `live_image_path` is set, every accepted frame also asks the SDK
    /// to write its own copy of the frame to that path.
    pub fn new(
        sdk: &Arc<S>,
        index: CameraIndex,
        capacity: usize,
        live_image_path: Option<PathBuf>,
    ) -> Self {
        Self {
            sdk: Arc::downgrade(sdk),
            index,
            live_image_path,
            good: AtomicU64::new(0),
            bad: AtomicU64::new(0),
            buffers: [
                Mutex::new(FrameBuffer::with_capacity(capacity)),
                Mutex::new(FrameBuffer::with_capacity(capacity)),
            ],
            front: AtomicUsize::new(0),
        }
    }

    /// Wraps the sink in a callback suitable for SDK registration.
    pub fn callback(self: &Arc<Self>) -> FrameCallback {
        let sink = Arc::clone(self);
        Arc::new(move |frame: &[u8]| sink.on_frame(frame))
    }

    fn lock(&self, slot: usize) -> MutexGuard<'_, FrameBuffer> {
        self.buffers[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_front(&self) -> MutexGuard<'_, FrameBuffer> {
        self.lock(self.front.load(Ordering::Acquire))
    }

    /// Classifies one delivered frame and updates counters and buffer.
    ///
    /// Never fails: bad frames only show up in the counters. The return
    /// value is the acknowledgment the driver expects. The call only waits
    /// when a reader is still copying the frame before the current one.
    pub fn on_frame(&self, frame: &[u8]) -> i32 {
        let back = 1 - self.front.load(Ordering::Acquire);
        let stored = self.lock(back).store(frame);
        self.front.store(back, Ordering::Release);

        match stored {
            Ok(len) => {
                self.good.fetch_add(1, Ordering::AcqRel);
                tracing::trace!(len, "Accepted frame");
                self.persist_live_image();
            }
            Err(rejection) => {
                self.bad.fetch_add(1, Ordering::AcqRel);
                match rejection {
                    FrameRejection::Empty => tracing::trace!("Rejected bad frame"),
                    FrameRejection::Oversized { len, capacity } => {
                        tracing::debug!(len, capacity, "Rejected oversized frame")
                    }
                }
            }
        }

        FRAME_ACK
    }

    fn persist_live_image(&self) {
        if let Some(path) = &self.live_image_path {
            if let Err(e) = self.save_current_frame(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to persist live image");
            }
        }
    }

    /// Frames accepted so far.
    pub fn good_count(&self) -> u64 {
        self.good.load(Ordering::Acquire)
    }

    /// Frames rejected so far.
    pub fn bad_count(&self) -> u64 {
        self.bad.load(Ordering::Acquire)
    }

    /// Both counters; the pair may straddle a concurrent frame.
    pub fn counts(&self) -> FrameCounts {
        FrameCounts {
            good: self.good_count(),
            bad: self.bad_count(),
        }
    }

    /// Length of the current frame, 0 if the latest frame was rejected.
    pub fn last_image_size(&self) -> usize {
        self.lock_front().len()
    }

    /// Capacity of the last-good-frame buffer.
    pub fn capacity(&self) -> usize {
        self.lock(0).capacity()
    }

    /// Copies the current frame out, or `None` when there is none.
    pub fn last_frame(&self) -> Option<FrameSnapshot> {
        let buffer = self.lock_front();
        let received_at = buffer.stored_at()?;
        Some(FrameSnapshot {
            bytes: buffer.current().to_vec(),
            received_at,
        })
    }

    /// Asks the SDK to write the device's last frame to `path`.
    ///
    /// This works on the SDK's own frame, not on the sink's copy. Fails
    /// with [`SdkError::NotOpen`] once the SDK has been dropped.
    pub fn save_current_frame(&self, path: &Path) -> SdkResult<()> {
        match self.sdk.upgrade() {
            Some(sdk) => sdk.save_to_file(self.index, path),
            None => Err(SdkError::NotOpen(self.index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{MockSdk, SdkCall};

    fn sink(capacity: usize) -> (Arc<MockSdk>, FrameSink<MockSdk>) {
        let sdk = Arc::new(MockSdk::new());
        let sink = FrameSink::new(&sdk, CameraIndex(0), capacity, None);
        (sdk, sink)
    }

    #[test]
    fn test_good_frame_is_copied_and_counted() {
        let (_, sink) = sink(16);
        assert_eq!(sink.on_frame(&[1, 2, 3]), FRAME_ACK);

        assert_eq!(sink.counts(), FrameCounts { good: 1, bad: 0 });
        assert_eq!(sink.last_image_size(), 3);
        assert_eq!(sink.last_frame().unwrap().bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_empty_frame_is_bad() {
        let (_, sink) = sink(16);
        sink.on_frame(&[5; 4]);
        assert_eq!(sink.on_frame(&[]), FRAME_ACK);

        assert_eq!(sink.counts(), FrameCounts { good: 1, bad: 1 });
        assert_eq!(sink.last_image_size(), 0);
        assert!(sink.last_frame().is_none());
    }

    #[test]
    fn test_frame_at_capacity_is_bad() {
        let (_, sink) = sink(16);
        sink.on_frame(&[0; 15]);
        sink.on_frame(&[0; 16]);

        assert_eq!(sink.good_count(), 1);
        assert_eq!(sink.bad_count(), 1);
        assert_eq!(sink.last_image_size(), 0);
    }

    #[test]
    fn test_good_frame_persists_live_image() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live_image.bmp");
        let sdk = Arc::new(MockSdk::new());
        sdk.open(CameraIndex(0)).unwrap();
        let sink = Arc::new(FrameSink::new(
            &sdk,
            CameraIndex(0),
            16,
            Some(live.clone()),
        ));
        sdk.register_frame_callback(CameraIndex(0), Default::default(), sink.callback())
            .unwrap();

        sdk.deliver(&[4, 5, 6]);
        sdk.deliver(&[]);

        let saves = sdk
            .calls()
            .into_iter()
            .filter(|c| matches!(c, SdkCall::SaveToFile(_)))
            .count();
        assert_eq!(saves, 1);
        assert_eq!(std::fs::read(&live).unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn test_persist_failure_is_swallowed() {
        let sdk = Arc::new(MockSdk::new());
        let sink = FrameSink::new(
            &sdk,
            CameraIndex(0),
            16,
            Some(PathBuf::from("unused.bmp")),
        );

        // The handle is not open, so the SDK save fails.
        assert_eq!(sink.on_frame(&[1]), FRAME_ACK);
        assert_eq!(sink.good_count(), 1);
    }

    #[test]
    fn test_save_current_frame_reports_sdk_result() {
        let (sdk, sink) = sink(16);
        assert!(sink.save_current_frame(Path::new("x.bmp")).is_err());
        assert_eq!(sdk.calls(), vec![SdkCall::SaveToFile(PathBuf::from("x.bmp"))]);
    }

    #[test]
    fn test_alternating_buffers_track_latest_frame() {
        let (_, sink) = sink(16);
        sink.on_frame(&[1; 5]);
        sink.on_frame(&[]);
        sink.on_frame(&[2; 3]);
        assert_eq!(sink.last_frame().unwrap().bytes(), &[2, 2, 2]);

        sink.on_frame(&[3; 9]);
        assert_eq!(sink.last_image_size(), 9);
        assert_eq!(sink.last_frame().unwrap().bytes(), &[3; 9]);
        assert_eq!(sink.capacity(), 16);
    }

    #[test]
    fn test_sink_does_not_keep_sdk_alive() {
        let sdk = Arc::new(MockSdk::new());
        sdk.open(CameraIndex(0)).unwrap();
        let sink = Arc::new(FrameSink::new(&sdk, CameraIndex(0), 16, None));
        sdk.register_frame_callback(CameraIndex(0), Default::default(), sink.callback())
            .unwrap();

        let weak = Arc::downgrade(&sdk);
        drop(sdk);

        assert!(weak.upgrade().is_none());
        assert_eq!(
            sink.save_current_frame(Path::new("x.bmp")),
            Err(SdkError::NotOpen(CameraIndex(0)))
        );
    }

    #[test]
    fn test_reader_holding_front_does_not_block_delivery() {
        use std::sync::mpsc;
        use std::time::Duration;

        let (_, sink) = sink(16);
        let sink = Arc::new(sink);
        sink.on_frame(&[1; 4]);

        let front = sink.lock_front();
        let (tx, rx) = mpsc::channel();
        let writer = {
            let sink = Arc::clone(&sink);
            std::thread::spawn(move || tx.send(sink.on_frame(&[2; 6])).unwrap())
        };

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(FRAME_ACK));
        drop(front);
        writer.join().unwrap();
        assert_eq!(sink.last_frame().unwrap().bytes(), &[2; 6]);
    }
}
