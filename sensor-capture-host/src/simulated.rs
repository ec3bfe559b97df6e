//! Simulated sensor front ends for host runs.

use std::f32::consts::TAU;
use std::time::Duration;

use sensor_capture_core::models::sensor_models::FRAME_CAPACITY;
use sensor_capture_core::processing::inertial::{self, AccelRange};
use sensor_capture_core::processing::pcm;

use crate::timed_source::FrameGenerator;

/// PDM microphone stand-in: a sine tone as 16-bit PCM, with the same
/// one-bit gain shift the microphone interrupt applies.
#[derive(Debug, Clone)]
pub struct MicrophoneSimulator {
    pub sample_rate_hz: u32,
    pub tone_hz: f32,
    /// Peak amplitude before the gain shift.
    pub amplitude: i16,
    pub gain_shift: u32,
    frame_samples: usize,
    phase: f32,
}

impl MicrophoneSimulator {
    /// Largest frame the PDM driver delivers.
    pub const MAX_FRAME_SAMPLES: usize = FRAME_CAPACITY / 2;

    pub fn new(sample_rate_hz: u32, tone_hz: f32) -> Self {
        Self {
            sample_rate_hz,
            tone_hz,
            amplitude: 8000,
            gain_shift: 1,
            frame_samples: Self::MAX_FRAME_SAMPLES,
            phase: 0.0,
        }
    }

    /// Samples per frame, clamped to the frame capacity.
    pub fn with_frame_samples(mut self, samples: usize) -> Self {
        self.frame_samples = samples.clamp(1, Self::MAX_FRAME_SAMPLES);
        self
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }
}

impl Default for MicrophoneSimulator {
    fn default() -> Self {
        Self::new(16_000, 440.0)
    }
}

impl FrameGenerator for MicrophoneSimulator {
    fn fill(&mut self, out: &mut [u8]) -> usize {
        let step = TAU * self.tone_hz / self.sample_rate_hz as f32;
        let mut samples = [0i16; Self::MAX_FRAME_SAMPLES];
        let samples = &mut samples[..self.frame_samples];
        for sample in samples.iter_mut() {
            *sample = (self.phase.sin() * self.amplitude as f32) as i16;
            self.phase = (self.phase + step) % TAU;
        }
        pcm::apply_gain_shift(samples, self.gain_shift);
        pcm::write_i16_le(samples, out)
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_samples as f64 / self.sample_rate_hz as f64)
    }
}

/// Accelerometer stand-in: one three-axis sample per frame, raw counts
/// converted to m/s² and stored as little-endian `f32`s.
///
/// The device rests flat (1 g on Z) with a slow sway on X.
#[derive(Debug, Clone)]
pub struct ImuSimulator {
    pub range: AccelRange,
    pub sample_interval: Duration,
    pub sway_hz: f32,
    tick: u64,
}

impl ImuSimulator {
    pub fn new(range: AccelRange, sample_interval: Duration) -> Self {
        Self {
            range,
            sample_interval,
            sway_hz: 1.0,
            tick: 0,
        }
    }

    /// Raw register counts for the current tick.
    pub fn raw_sample(&self) -> [i16; 3] {
        let one_g = (1.0 / self.range.sensitivity()).min(i16::MAX as f32);
        let t = self.tick as f32 * self.sample_interval.as_secs_f32();
        let sway = (TAU * self.sway_hz * t).sin() * one_g * 0.25;
        [sway as i16, 0, one_g as i16]
    }
}

impl Default for ImuSimulator {
    fn default() -> Self {
        Self::new(AccelRange::G2, Duration::from_millis(16))
    }
}

impl FrameGenerator for ImuSimulator {
    fn fill(&mut self, out: &mut [u8]) -> usize {
        let raw = self.raw_sample();
        self.tick += 1;
        let axes = raw.map(|axis| inertial::raw_to_ms2(axis, self.range));
        out[..12].copy_from_slice(&inertial::axes_to_bytes(axes));
        12
    }

    fn period(&self) -> Duration {
        self.sample_interval
    }
}
