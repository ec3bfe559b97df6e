//! # sensor-capture-host
//!
//! Host backend for sensor-capture: timer threads standing in for the PDM
//! microphone and accelerometer interrupts.
//!
//! Provides:
//! - `TimedFrameSource`: `FrameSource` driving any `FrameGenerator` from a named thread
//! - `MicrophoneSimulator`: sine tone as shifted 16-bit PCM
//! - `ImuSimulator`: three-axis accelerometer frames in m/s²
//!
//! ## Usage
//! ```no_run
//! use sensor_capture_core::{CaptureConfiguration, FileRegion, FrameQueue, RecordSession};
//!
//! let config = CaptureConfiguration::microphone();
//! let storage = FileRegion::create("/tmp/record.bin", 1 << 20, 4096).unwrap();
//! let mut queue = FrameQueue::new(config.queue_depth);
//! let mut source = sensor_capture_host::microphone_source(&config);
//! let mut session = RecordSession::with_defaults(config, storage).unwrap();
//! let report = session.run(&mut queue, &mut source).unwrap();
//! println!("sealed {} bytes, digest {}", report.bytes_captured, report.digest);
//! ```

pub mod simulated;
pub mod timed_source;

use std::time::Duration;

use sensor_capture_core::models::config::CaptureConfiguration;
use sensor_capture_core::processing::inertial::AccelRange;

pub use simulated::{ImuSimulator, MicrophoneSimulator};
pub use timed_source::{FrameGenerator, TimedFrameSource};

/// Microphone source sampling at the rate implied by `config.sample_interval_ms`.
pub fn microphone_source(config: &CaptureConfiguration) -> TimedFrameSource<MicrophoneSimulator> {
    let rate = (1000.0 / config.sample_interval_ms).round() as u32;
    TimedFrameSource::new("pdm-mic", MicrophoneSimulator::new(rate.max(1), 440.0))
}

/// ±2 g accelerometer source producing one sample every `config.sample_interval_ms`.
pub fn imu_source(config: &CaptureConfiguration) -> TimedFrameSource<ImuSimulator> {
    let interval = Duration::from_secs_f32(config.sample_interval_ms / 1000.0);
    TimedFrameSource::new("imu", ImuSimulator::new(AccelRange::G2, interval))
}
