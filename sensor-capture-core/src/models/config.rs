use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::sensor_models::{ChannelDescriptor, PayloadInfo};

/// What the storage sink does when a single frame write or signature update
/// fails mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameErrorPolicy {
    /// Log, count in the report, keep sampling.
    #[default]
    Continue,
    /// Abort the session on the first failed frame.
    Abort,
}

/// Configuration for a capture session.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides (see [`CaptureConfiguration::from_json`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Unique device id written into the header (e.g. MAC address).
    pub device_id: String,

    /// Device type written into the header.
    pub device_type: String,

    /// Interval between samples in milliseconds (16 kHz audio = 0.0625).
    pub sample_interval_ms: f32,

    /// Requested recording length in milliseconds.
    pub sample_length_ms: u32,

    /// Bytes per sample as stored (2 for i16 PCM, 12 for three f32 axes).
    pub sample_width: usize,

    /// Channel descriptors written into the header.
    pub channels: Vec<ChannelDescriptor>,

    /// Label of the recording, carried into the report.
    pub label: String,

    /// HMAC key used to sign the record. Empty selects unkeyed SHA-256.
    pub hmac_key: String,

    /// Reference trailer tag identifying the binary payload format.
    pub reference_tag: String,

    /// Depth of the interrupt-to-task frame queue (default: 32).
    pub queue_depth: usize,

    /// Capacity of the header templating buffer (default: 1024).
    pub header_capacity: usize,

    /// Samples per double-buffer window in inference mode.
    pub window_samples: usize,

    pub frame_error_policy: FrameErrorPolicy,

    /// Bounded wait for the next frame, in milliseconds. `None` waits forever.
    pub frame_wait_ms: Option<u64>,
}

impl CaptureConfiguration {
    /// 16 kHz mono PCM from the PDM microphone.
    pub fn microphone() -> Self {
        Self::default()
    }

    /// Three-axis accelerometer at 62.5 Hz, stored as little-endian f32 triples.
    pub fn inertial() -> Self {
        Self {
            sample_interval_ms: 16.0,
            sample_length_ms: 2000,
            sample_width: 12,
            channels: ChannelDescriptor::accelerometer(),
            reference_tag: "Ref-BINARY-f32".into(),
            window_samples: 375,
            ..Self::default()
        }
    }

    /// Parse a JSON override document on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("invalid configuration: {}", e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.sample_interval_ms > 0.0) {
            return Err("sample interval must be positive".into());
        }
        if self.sample_width == 0 {
            return Err("sample width must be non-zero".into());
        }
        if self.channels.is_empty() {
            return Err("at least one channel descriptor is required".into());
        }
        if self.device_type.is_empty() {
            return Err("device type is required".into());
        }
        if self.queue_depth == 0 {
            return Err("queue depth must be non-zero".into());
        }
        if self.header_capacity == 0 {
            return Err("header capacity must be non-zero".into());
        }
        // Tag plus up to three padding bytes must fit the 23-byte trailer head.
        if self.reference_tag.is_empty() || !self.reference_tag.is_ascii() || self.reference_tag.len() > 20 {
            return Err(format!("invalid reference tag: {:?}", self.reference_tag));
        }
        Ok(())
    }

    /// Number of samples for `sample_length_ms`, rounded up to an even count
    /// so flash writes stay word aligned.
    pub fn samples_required(&self) -> u32 {
        let mut samples = (self.sample_length_ms as f32 / self.sample_interval_ms) as u32;
        if samples & 1 == 1 {
            samples += 1;
        }
        samples
    }

    /// Session target in bytes.
    pub fn target_bytes(&self) -> usize {
        self.samples_required() as usize * self.sample_width
    }

    pub fn frame_wait(&self) -> Option<Duration> {
        self.frame_wait_ms.map(Duration::from_millis)
    }

    pub fn payload_info(&self) -> PayloadInfo {
        PayloadInfo {
            device_id: self.device_id.clone(),
            device_type: self.device_type.clone(),
            sample_interval_ms: self.sample_interval_ms,
            channels: self.channels.clone(),
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            device_id: "00:00:00:00:00:00".into(),
            device_type: "SENSOR_NODE".into(),
            sample_interval_ms: 1000.0 / 16000.0,
            sample_length_ms: 1000,
            sample_width: 2,
            channels: ChannelDescriptor::microphone(),
            label: "sample".into(),
            hmac_key: String::new(),
            reference_tag: "Ref-BINARY-i16".into(),
            queue_depth: 32,
            header_capacity: 1024,
            window_samples: 16000,
            frame_error_policy: FrameErrorPolicy::Continue,
            frame_wait_ms: None,
        }
    }
}
