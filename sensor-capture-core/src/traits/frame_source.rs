use crate::models::error::CaptureError;
use crate::processing::frame_queue::FrameProducer;

/// A hardware (or simulated) source delivering sample frames at a fixed
/// period.
///
/// `start` registers the producer as the "frame arrived" handler. The source
/// calls [`FrameProducer::push`] from its interrupt or callback context and
/// must not touch any other session state.
pub trait FrameSource: Send {
    fn start(&mut self, producer: FrameProducer) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Nominal period between frames, in microseconds.
    fn frame_period_us(&self) -> u64;
}
