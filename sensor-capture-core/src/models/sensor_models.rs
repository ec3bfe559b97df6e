use serde::{Deserialize, Serialize};

/// Maximum payload of one [`SampleFrame`]: 512 16-bit samples, the largest
/// frame the PDM front end delivers.
pub const FRAME_CAPACITY: usize = 1024;

/// One sensor axis or stream described in the record header.
///
/// `units` follow SenML naming (`m/s2`, `wav`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub units: String,
}

impl ChannelDescriptor {
    pub fn new(name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
        }
    }

    /// Single PCM audio stream.
    pub fn microphone() -> Vec<Self> {
        vec![Self::new("audio", "wav")]
    }

    /// Three-axis accelerometer in m/s².
    pub fn accelerometer() -> Vec<Self> {
        vec![
            Self::new("accX", "m/s2"),
            Self::new("accY", "m/s2"),
            Self::new("accZ", "m/s2"),
        ]
    }
}

/// Device and stream description handed to the header builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadInfo {
    pub device_id: String,
    pub device_type: String,
    pub sample_interval_ms: f32,
    pub channels: Vec<ChannelDescriptor>,
}

/// Fixed-size chunk of raw sample bytes moved from interrupt to task context.
///
/// Lives inline (no heap) so the producer can build one without allocating.
#[derive(Clone, Copy)]
pub struct SampleFrame {
    data: [u8; FRAME_CAPACITY],
    len: usize,
}

impl SampleFrame {
    /// Copy `bytes` into a new frame. `None` when `bytes` exceeds
    /// [`FRAME_CAPACITY`]; a frame is never truncated.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let len = bytes.len();
        if len > FRAME_CAPACITY {
            return None;
        }
        let mut data = [0u8; FRAME_CAPACITY];
        data[..len].copy_from_slice(bytes);
        Some(Self { data, len })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for SampleFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleFrame").field("len", &self.len).finish()
    }
}

/// Counters collected by the consumer task during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub frames_received: u64,
    pub bytes_written: u64,
    pub frame_write_failures: u64,
    pub signature_update_failures: u64,
    /// Oversized frames refused by the producer.
    pub frames_rejected: u64,
    pub queue_high_water: usize,
}
