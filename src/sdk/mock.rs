//! In-process SDK used by tests and the demo binary.
//!
//! `MockSdk` records every call in order, can be told to fail specific
//! calls, and hands frames to the registered callback either on demand
//! ([`MockSdk::deliver`]) or from a background thread while streaming.

use super::boundary::{
    CameraIndex, CameraSdk, FrameCallback, FrameFormat, ParamId, ParamRange, SdkError, SdkResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A call observed by the mock, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkCall {
    /// [`CameraSdk::discover`].
    Discover,
    /// [`CameraSdk::open`].
    Open(CameraIndex),
    /// [`CameraSdk::close`].
    Close(CameraIndex),
    /// [`CameraSdk::set_parameter`] with parameter and value.
    SetParameter(ParamId, u32),
    /// [`CameraSdk::parameter`].
    Parameter(ParamId),
    /// [`CameraSdk::parameter_range`].
    ParameterRange(ParamId),
    /// [`CameraSdk::register_frame_callback`] with the requested format.
    RegisterCallback(FrameFormat),
    /// [`CameraSdk::set_mode`].
    SetMode(u32),
    /// [`CameraSdk::set_exposure`] in milliseconds.
    SetExposure(u32),
    /// [`CameraSdk::start`].
    Start,
    /// [`CameraSdk::stop`].
    Stop,
    /// [`CameraSdk::save_to_file`] with the target path.
    SaveToFile(PathBuf),
}

/// Settings for frames generated while streaming.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticStream {
    /// Delay between frames.
    pub interval: Duration,
    /// Length of each good frame in bytes.
    pub frame_size: usize,
    /// Every n-th frame is delivered as a zero-length bad frame (0 disables).
    pub bad_every: u64,
}

impl Default for SyntheticStream {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            frame_size: 1024 * 768 * 3,
            bad_every: 0,
        }
    }
}

#[derive(Default)]
struct MockState {
    device_count: usize,
    calls: Vec<SdkCall>,
    failures: Vec<(SdkCall, SdkError)>,
    open: bool,
    streaming: bool,
    mode: Option<u32>,
    exposure_ms: Option<u32>,
    params: HashMap<ParamId, u32>,
    callback: Option<FrameCallback>,
    last_frame: Vec<u8>,
    delivery: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<MockState>,
    running: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `call` and returns the injected failure for it, if any.
    fn record(&self, call: SdkCall) -> SdkResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        let failure = state
            .failures
            .iter()
            .find(|(failing, _)| *failing == call)
            .map(|(_, err)| err.clone());
        state.calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn deliver(&self, frame: &[u8]) -> Option<i32> {
        let callback = {
            let mut state = self.lock();
            if !frame.is_empty() {
                state.last_frame.clear();
                state.last_frame.extend_from_slice(frame);
            }
            state.callback.clone()
        };
        // The callback may call back into the SDK, so the lock is released first.
        callback.map(|cb| cb(frame))
    }
}

/// Mock SDK with call recording and failure injection.
pub struct MockSdk {
    shared: Arc<Shared>,
    stream: Option<SyntheticStream>,
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSdk {
    /// Creates a mock with one attached camera.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState {
                    device_count: 1,
                    ..MockState::default()
                }),
                running: AtomicBool::new(false),
            }),
            stream: None,
        }
    }

    /// Creates a mock that reports no attached camera.
    pub fn without_device() -> Self {
        let sdk = Self::new();
        sdk.shared.lock().device_count = 0;
        sdk
    }

    /// Generates frames from a background thread between `start` and `stop`.
    #[must_use]
    pub fn with_synthetic_stream(mut self, stream: SyntheticStream) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Makes every future `call` fail with `err`.
    pub fn fail_on(&self, call: SdkCall, err: SdkError) {
        self.shared.lock().failures.push((call, err));
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.shared.lock().failures.clear();
    }

    /// Returns the calls made so far.
    pub fn calls(&self) -> Vec<SdkCall> {
        self.shared.lock().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Whether the device handle is open.
    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    /// Whether `start` succeeded without a later `stop`.
    pub fn is_streaming(&self) -> bool {
        self.shared.lock().streaming
    }

    /// Last value written to `param`, if any.
    pub fn parameter_value(&self, param: ParamId) -> Option<u32> {
        self.shared.lock().params.get(&param).copied()
    }

    /// Last exposure set, in milliseconds.
    pub fn exposure_ms(&self) -> Option<u32> {
        self.shared.lock().exposure_ms
    }

    /// Last acquisition mode selected.
    pub fn mode(&self) -> Option<u32> {
        self.shared.lock().mode
    }

    /// Hands `frame` to the registered callback as the driver thread would.
    ///
    /// Returns the callback's acknowledgment, or `None` when no callback is
    /// registered.
    pub fn deliver(&self, frame: &[u8]) -> Option<i32> {
        self.shared.deliver(frame)
    }

    fn spawn_delivery(&self, stream: SyntheticStream) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            let mut sequence: u64 = 0;
            let mut frame = vec![0u8; stream.frame_size];
            while shared.running.load(Ordering::Acquire) {
                sequence += 1;
                if stream.bad_every != 0 && sequence % stream.bad_every == 0 {
                    shared.deliver(&[]);
                } else {
                    let shade = (sequence % 256) as u8;
                    frame.iter_mut().for_each(|b| *b = shade);
                    shared.deliver(&frame);
                }
                thread::sleep(stream.interval);
            }
            tracing::debug!(frames = sequence, "Synthetic delivery thread exited");
        })
    }

    fn halt_delivery(&self) {
        self.shared.running.store(false, Ordering::Release);
        let handle = self.shared.lock().delivery.take();
        if let Some(handle) = handle {
            // The last owner can go away inside a callback on the delivery
            // thread itself; that thread exits on its own once `running` drops.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!("Synthetic delivery thread panicked");
            }
        }
    }
}

impl Drop for MockSdk {
    fn drop(&mut self) {
        self.halt_delivery();
    }
}

fn require_open(state: &MockState, index: CameraIndex) -> SdkResult<()> {
    if state.open {
        Ok(())
    } else {
        Err(SdkError::NotOpen(index))
    }
}

impl CameraSdk for MockSdk {
    fn discover(&self) -> SdkResult<usize> {
        let state = self.shared.record(SdkCall::Discover)?;
        Ok(state.device_count)
    }

    fn open(&self, index: CameraIndex) -> SdkResult<()> {
        let mut state = self.shared.record(SdkCall::Open(index))?;
        if index.0 as usize >= state.device_count {
            return Err(SdkError::NoDevice);
        }
        state.open = true;
        Ok(())
    }

    fn close(&self, index: CameraIndex) -> SdkResult<()> {
        let mut state = self.shared.record(SdkCall::Close(index))?;
        require_open(&state, index)?;
        state.open = false;
        state.callback = None;
        Ok(())
    }

    fn set_parameter(&self, index: CameraIndex, param: ParamId, value: u32) -> SdkResult<()> {
        let mut state = self.shared.record(SdkCall::SetParameter(param, value))?;
        require_open(&state, index)?;
        state.params.insert(param, value);
        Ok(())
    }

    fn parameter(&self, index: CameraIndex, param: ParamId) -> SdkResult<u32> {
        let state = self.shared.record(SdkCall::Parameter(param))?;
        require_open(&state, index)?;
        Ok(state.params.get(&param).copied().unwrap_or_default())
    }

    fn parameter_range(&self, index: CameraIndex, param: ParamId) -> SdkResult<ParamRange> {
        let state = self.shared.record(SdkCall::ParameterRange(param))?;
        require_open(&state, index)?;
        let range = match param {
            ParamId::FlipHorizontal | ParamId::FlipVertical | ParamId::BadFrameDelivery => {
                ParamRange { min: 0, max: 1, default: 0 }
            }
            ParamId::Pll => ParamRange { min: 10, max: 48, default: 20 },
            ParamId::Contrast => ParamRange { min: 0, max: 511, default: 256 },
            _ => ParamRange { min: 0, max: 255, default: 128 },
        };
        Ok(range)
    }

    fn register_frame_callback(
        &self,
        index: CameraIndex,
        format: FrameFormat,
        callback: FrameCallback,
    ) -> SdkResult<()> {
        let mut state = self.shared.record(SdkCall::RegisterCallback(format))?;
        require_open(&state, index)?;
        state.callback = Some(callback);
        Ok(())
    }

    fn set_mode(&self, index: CameraIndex, mode: u32) -> SdkResult<()> {
        let mut state = self.shared.record(SdkCall::SetMode(mode))?;
        require_open(&state, index)?;
        state.mode = Some(mode);
        Ok(())
    }

    fn set_exposure(&self, index: CameraIndex, milliseconds: u32) -> SdkResult<()> {
        let mut state = self.shared.record(SdkCall::SetExposure(milliseconds))?;
        require_open(&state, index)?;
        state.exposure_ms = Some(milliseconds);
        Ok(())
    }

    fn start(&self, index: CameraIndex) -> SdkResult<()> {
        let mut state = self.shared.record(SdkCall::Start)?;
        require_open(&state, index)?;
        state.streaming = true;
        if let Some(stream) = self.stream {
            self.shared.running.store(true, Ordering::Release);
            state.delivery = Some(self.spawn_delivery(stream));
        }
        Ok(())
    }

    fn stop(&self, index: CameraIndex) -> SdkResult<()> {
        {
            let mut state = self.shared.record(SdkCall::Stop)?;
            require_open(&state, index)?;
            state.streaming = false;
        }
        self.halt_delivery();
        Ok(())
    }

    fn save_to_file(&self, index: CameraIndex, path: &Path) -> SdkResult<()> {
        let frame = {
            let state = self.shared.record(SdkCall::SaveToFile(path.to_path_buf()))?;
            require_open(&state, index)?;
            if state.last_frame.is_empty() {
                return Err(SdkError::Status(-1));
            }
            state.last_frame.clone()
        };
        std::fs::write(path, frame).map_err(|e| SdkError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_records_calls_in_order() {
        let sdk = MockSdk::new();
        assert_eq!(sdk.discover().unwrap(), 1);
        sdk.open(CameraIndex(0)).unwrap();
        sdk.set_mode(CameraIndex(0), 4).unwrap();

        assert_eq!(
            sdk.calls(),
            vec![SdkCall::Discover, SdkCall::Open(CameraIndex(0)), SdkCall::SetMode(4)]
        );
        assert_eq!(sdk.mode(), Some(4));
    }

    #[test]
    fn test_injected_failure_is_returned_and_recorded() {
        let sdk = MockSdk::new();
        sdk.fail_on(SdkCall::Open(CameraIndex(0)), SdkError::Status(7));

        assert_eq!(sdk.open(CameraIndex(0)), Err(SdkError::Status(7)));
        assert!(!sdk.is_open());
        assert_eq!(sdk.calls(), vec![SdkCall::Open(CameraIndex(0))]);

        sdk.clear_failures();
        assert!(sdk.open(CameraIndex(0)).is_ok());
    }

    #[test]
    fn test_calls_require_open_handle() {
        let sdk = MockSdk::new();
        assert_eq!(
            sdk.start(CameraIndex(0)),
            Err(SdkError::NotOpen(CameraIndex(0)))
        );
    }

    #[test]
    fn test_deliver_invokes_registered_callback() {
        let sdk = MockSdk::new();
        assert_eq!(sdk.deliver(&[1, 2, 3]), None);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = Arc::clone(&seen);
        sdk.open(CameraIndex(0)).unwrap();
        sdk.register_frame_callback(
            CameraIndex(0),
            FrameFormat::Rgb,
            Arc::new(move |frame: &[u8]| {
                seen_cb.fetch_add(frame.len(), Ordering::SeqCst);
                0
            }),
        )
        .unwrap();

        assert_eq!(sdk.deliver(&[1, 2, 3]), Some(0));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_save_to_file_writes_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.bmp");
        let sdk = MockSdk::new();
        sdk.open(CameraIndex(0)).unwrap();

        assert_eq!(sdk.save_to_file(CameraIndex(0), &path), Err(SdkError::Status(-1)));

        sdk.deliver(&[9, 8, 7]);
        sdk.deliver(&[]);
        sdk.save_to_file(CameraIndex(0), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn test_synthetic_stream_delivers_until_stopped() {
        let sdk = MockSdk::new().with_synthetic_stream(SyntheticStream {
            interval: Duration::from_millis(1),
            frame_size: 16,
            bad_every: 2,
        });
        let frames = Arc::new(AtomicUsize::new(0));
        let frames_cb = Arc::clone(&frames);
        sdk.open(CameraIndex(0)).unwrap();
        sdk.register_frame_callback(
            CameraIndex(0),
            FrameFormat::Rgb,
            Arc::new(move |_: &[u8]| {
                frames_cb.fetch_add(1, Ordering::SeqCst);
                0
            }),
        )
        .unwrap();

        sdk.start(CameraIndex(0)).unwrap();
        while frames.load(Ordering::SeqCst) < 4 {
            thread::sleep(Duration::from_millis(1));
        }
        sdk.stop(CameraIndex(0)).unwrap();

        let after_stop = frames.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(frames.load(Ordering::SeqCst), after_stop);
        assert!(!sdk.is_streaming());
    }
}
