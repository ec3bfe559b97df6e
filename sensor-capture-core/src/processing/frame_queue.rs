use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::models::error::CaptureError;
use crate::models::sensor_models::SampleFrame;

/// Interrupt-side handle of the [`FrameQueue`].
///
/// Cloneable and `Send`, handed to a [`FrameSource`](crate::traits::frame_source::FrameSource)
/// when it starts. `push` only copies the frame into the queue; it never
/// allocates and never touches session state.
#[derive(Clone)]
pub struct FrameProducer {
    tx: Sender<SampleFrame>,
    recording: Arc<AtomicBool>,
    rejected: Arc<AtomicU64>,
}

impl FrameProducer {
    /// Queue a copy of `bytes` if recording is enabled.
    ///
    /// Blocks while the queue is full. Returns `false` when the frame was
    /// dropped because recording is disabled, or refused because it exceeds
    /// [`FRAME_CAPACITY`](crate::models::sensor_models::FRAME_CAPACITY).
    /// Refusals are counted in [`FrameQueue::rejected`].
    pub fn push(&self, bytes: &[u8]) -> bool {
        if !self.is_recording() {
            return false;
        }
        match SampleFrame::from_bytes(bytes) {
            Some(frame) => self.push_frame(frame),
            None => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn push_frame(&self, frame: SampleFrame) -> bool {
        if !self.recording.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(frame).is_ok()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }
}

/// Handle for switching recording off from inside a drain callback, while
/// the queue itself is mutably borrowed.
#[derive(Clone)]
pub struct RecordingSwitch {
    recording: Arc<AtomicBool>,
}

impl RecordingSwitch {
    pub fn set(&self, enabled: bool) {
        self.recording.store(enabled, Ordering::Release);
    }

    pub fn is_on(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }
}

/// Bounded FIFO carrying [`SampleFrame`]s from the producer context to the
/// single consumer task.
///
/// The consumer side tracks the high-water mark (largest occupancy seen while
/// draining). It is the only overrun signal: nothing is dropped silently once
/// a frame has been accepted.
pub struct FrameQueue {
    tx: Sender<SampleFrame>,
    rx: Receiver<SampleFrame>,
    recording: Arc<AtomicBool>,
    rejected: Arc<AtomicU64>,
    capacity: usize,
    high_water: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self {
            tx,
            rx,
            recording: Arc::new(AtomicBool::new(false)),
            rejected: Arc::new(AtomicU64::new(0)),
            capacity,
            high_water: 0,
        }
    }

    pub fn producer(&self) -> FrameProducer {
        FrameProducer {
            tx: self.tx.clone(),
            recording: Arc::clone(&self.recording),
            rejected: Arc::clone(&self.rejected),
        }
    }

    pub fn recording_switch(&self) -> RecordingSwitch {
        RecordingSwitch {
            recording: Arc::clone(&self.recording),
        }
    }

    pub fn set_recording(&self, enabled: bool) {
        self.recording.store(enabled, Ordering::Release);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Block for the next frame, then hand every queued frame to `f` before
    /// returning.
    ///
    /// `wait` of `None` blocks indefinitely. An error returned by `f` stops
    /// the drain and is propagated; frames still queued stay queued.
    pub fn drain_with<F>(&mut self, wait: Option<Duration>, mut f: F) -> Result<usize, CaptureError>
    where
        F: FnMut(&SampleFrame) -> Result<(), CaptureError>,
    {
        let mut frame = match wait {
            None => self
                .rx
                .recv()
                .map_err(|_| CaptureError::SourceFailure("frame queue disconnected".into()))?,
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CaptureError::SourceStalled {
                        waited_ms: timeout.as_millis() as u64,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::SourceFailure("frame queue disconnected".into()))
                }
            },
        };

        let mut drained = 0;
        loop {
            // Occupancy at pop time includes the frame just taken.
            self.observe(self.rx.len() + 1);
            f(&frame)?;
            drained += 1;

            let remaining = self.rx.len();
            self.observe(remaining);
            if remaining == 0 {
                break;
            }
            frame = match self.rx.try_recv() {
                Ok(next) => next,
                Err(_) => break,
            };
        }
        Ok(drained)
    }

    /// Discard every queued frame. Returns how many were dropped.
    pub fn reset(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Frames currently queued.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    pub fn reset_high_water(&mut self) {
        self.high_water = 0;
    }

    /// Oversized frames refused by producers since the last
    /// [`reset_rejected`](Self::reset_rejected).
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn reset_rejected(&mut self) {
        self.rejected.store(0, Ordering::Relaxed);
    }

    /// The queue was observed completely full since the last
    /// [`reset_high_water`](Self::reset_high_water).
    pub fn reached_capacity(&self) -> bool {
        self.high_water >= self.capacity
    }

    fn observe(&mut self, occupancy: usize) {
        let occupancy = occupancy.min(self.capacity);
        if occupancy > self.high_water {
            self.high_water = occupancy;
        }
    }
}
