//! Timer-driven frame source.
//!
//! Stands in for the sensor interrupt on a host: a dedicated thread asks a
//! [`FrameGenerator`] for one frame per period and hands it to the
//! [`FrameProducer`]. The thread does nothing else, mirroring what an
//! interrupt handler is allowed to do.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use sensor_capture_core::models::error::CaptureError;
use sensor_capture_core::models::sensor_models::FRAME_CAPACITY;
use sensor_capture_core::processing::frame_queue::FrameProducer;
use sensor_capture_core::traits::frame_source::FrameSource;

/// Produces the raw bytes of one frame per tick.
pub trait FrameGenerator: Send + 'static {
    /// Fill `out` with the next frame and return its length in bytes.
    fn fill(&mut self, out: &mut [u8]) -> usize;

    /// Time between two frames.
    fn period(&self) -> Duration;
}

/// [`FrameSource`] driven by a named timer thread.
pub struct TimedFrameSource<G: FrameGenerator> {
    name: String,
    generator: Arc<Mutex<G>>,
    running: Arc<AtomicBool>,
    frames_generated: Arc<AtomicU64>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<G: FrameGenerator> TimedFrameSource<G> {
    pub fn new(name: impl Into<String>, generator: G) -> Self {
        Self {
            name: name.into(),
            generator: Arc::new(Mutex::new(generator)),
            running: Arc::new(AtomicBool::new(false)),
            frames_generated: Arc::new(AtomicU64::new(0)),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames produced since creation, whether or not the queue accepted them.
    pub fn frames_generated(&self) -> u64 {
        self.frames_generated.load(Ordering::Relaxed)
    }

    /// Access the generator between sessions.
    pub fn with_generator<R>(&self, f: impl FnOnce(&mut G) -> R) -> R {
        f(&mut self.generator.lock())
    }
}

impl<G: FrameGenerator> FrameSource for TimedFrameSource<G> {
    fn start(&mut self, producer: FrameProducer) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::SourceFailure(format!("{} already running", self.name)));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let generator = Arc::clone(&self.generator);
        let frames = Arc::clone(&self.frames_generated);
        let period = self.generator.lock().period();

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let mut buf = [0u8; FRAME_CAPACITY];
                let mut next = Instant::now();
                while running.load(Ordering::SeqCst) {
                    let len = generator.lock().fill(&mut buf);
                    frames.fetch_add(1, Ordering::Relaxed);
                    producer.push(&buf[..len]);

                    next += period;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::SourceFailure(format!("failed to spawn {}: {}", self.name, e))
            })?;

        *self.handle.lock() = Some(handle);
        log::debug!("{} started, period {:?}", self.name, period);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            handle
                .join()
                .map_err(|_| CaptureError::SourceFailure(format!("{} thread panicked", self.name)))?;
            log::debug!("{} stopped after {} frames", self.name, self.frames_generated());
        }
        Ok(())
    }

    fn frame_period_us(&self) -> u64 {
        self.generator.lock().period().as_micros() as u64
    }
}

impl<G: FrameGenerator> Drop for TimedFrameSource<G> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
