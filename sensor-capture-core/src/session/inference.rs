use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::processing::double_buffer::DoubleBuffer;
use crate::processing::frame_queue::FrameQueue;
use crate::processing::pcm;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::frame_source::FrameSource;

/// Outcome of one completed inference window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Ready,
    /// The frame queue filled up while this window was collected; samples
    /// may have been delayed past the window boundary.
    Overrun,
}

impl WindowStatus {
    pub fn is_overrun(self) -> bool {
        self == Self::Overrun
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceOptions {
    pub window_samples: usize,
    /// Keep recording after each window instead of stopping after the first.
    pub continuous: bool,
    pub frame_wait: Option<Duration>,
}

impl InferenceOptions {
    pub fn from_config(config: &CaptureConfiguration, continuous: bool) -> Self {
        Self {
            window_samples: config.window_samples,
            continuous,
            frame_wait: config.frame_wait(),
        }
    }
}

/// Double-buffer mode: i16 samples from the frame queue are collected into
/// ping-pong windows for a downstream classifier.
///
/// Borrows the queue and source for its whole lifetime; dropping the session
/// stops the source.
pub struct InferenceSession<'a> {
    queue: &'a mut FrameQueue,
    source: &'a mut dyn FrameSource,
    buffer: DoubleBuffer<i16>,
    options: InferenceOptions,
    windows: u64,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    running: bool,
}

impl<'a> InferenceSession<'a> {
    /// Allocate both windows, enable recording and start the source.
    pub fn start(
        queue: &'a mut FrameQueue,
        source: &'a mut dyn FrameSource,
        options: InferenceOptions,
        delegate: Option<Arc<dyn CaptureDelegate>>,
    ) -> Result<Self, CaptureError> {
        if options.window_samples == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "inference window must hold at least one sample".into(),
            ));
        }

        queue.set_recording(false);
        queue.reset();
        queue.reset_high_water();
        queue.set_recording(true);
        if let Err(e) = source.start(queue.producer()) {
            queue.set_recording(false);
            return Err(e);
        }

        log::info!(
            "Inference started: {} samples per window, {}",
            options.window_samples,
            if options.continuous { "continuous" } else { "one-shot" }
        );

        let session = Self {
            queue,
            source,
            buffer: DoubleBuffer::new(options.window_samples),
            options,
            windows: 0,
            delegate,
            running: true,
        };
        session.notify_state(CaptureState::Inferencing { windows: 0 });
        Ok(session)
    }

    /// Block until the next window is complete.
    pub fn record_window(&mut self) -> Result<WindowStatus, CaptureError> {
        if !self.running {
            return Err(CaptureError::InvalidState("inference session has ended".into()));
        }
        if !self.buffer.is_ready() && !self.queue.is_recording() && self.queue.pending() == 0 {
            return Err(CaptureError::InvalidState(
                "recording stopped before the window completed".into(),
            ));
        }

        while !self.buffer.is_ready() {
            let buffer = &mut self.buffer;
            self.queue.drain_with(self.options.frame_wait, |frame| {
                buffer.extend(pcm::i16_samples(frame.as_bytes()));
                Ok(())
            })?;
        }

        if !self.options.continuous {
            self.queue.set_recording(false);
        }

        let status = if self.options.continuous && self.queue.reached_capacity() {
            let overrun = CaptureError::QueueOverrun {
                high_water: self.queue.high_water(),
                capacity: self.queue.capacity(),
            };
            log::error!("Sample buffer overrun in window {}: {}", self.windows, overrun);
            if let Some(ref delegate) = self.delegate {
                delegate.on_error(&overrun);
            }
            WindowStatus::Overrun
        } else {
            WindowStatus::Ready
        };

        self.queue.reset_high_water();
        self.buffer.clear_ready();
        let index = self.windows;
        self.windows += 1;

        self.notify_state(CaptureState::Inferencing { windows: self.windows });
        if let Some(ref delegate) = self.delegate {
            delegate.on_window(index, status);
        }
        Ok(status)
    }

    /// The most recently completed window.
    pub fn window(&self) -> &[i16] {
        self.buffer.readable()
    }

    /// Copy `out.len()` samples of the completed window, starting at
    /// `offset`, as floats in `[-1, 1)`.
    pub fn signal_data(&self, offset: usize, out: &mut [f32]) -> Result<(), CaptureError> {
        let window = self.buffer.readable();
        let end = offset
            .checked_add(out.len())
            .filter(|&end| end <= window.len())
            .ok_or_else(|| {
                CaptureError::InvalidState(format!(
                    "signal range {}+{} outside window of {}",
                    offset,
                    out.len(),
                    window.len()
                ))
            })?;
        pcm::q15_to_f32(&window[offset..end], out);
        Ok(())
    }

    /// Drop the partial window and queued frames, then resume recording.
    pub fn reset_buffers(&mut self) {
        self.buffer.reset();
        self.queue.reset();
        self.queue.reset_high_water();
        self.queue.set_recording(true);
    }

    pub fn windows_completed(&self) -> u64 {
        self.windows
    }

    pub fn is_continuous(&self) -> bool {
        self.options.continuous
    }

    /// Stop recording and the source, and free the windows.
    pub fn end(mut self) -> Result<(), CaptureError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), CaptureError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        self.queue.set_recording(false);
        self.queue.reset();
        let stopped = self.source.stop();
        self.queue.reset();

        log::info!("Inference stopped after {} windows", self.windows);
        self.notify_state(CaptureState::Idle);
        stopped
    }

    fn notify_state(&self, state: CaptureState) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&state);
        }
    }
}

impl Drop for InferenceSession<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Failed to stop frame source: {}", e);
        }
    }
}
