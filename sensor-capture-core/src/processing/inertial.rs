use serde::{Deserialize, Serialize};

/// Standard gravity, m/s² per g.
pub const CONVERT_G_TO_MS2: f32 = 9.80665;

/// Accelerometer full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccelRange {
    #[default]
    G2,
    G4,
    G8,
    G16,
}

impl AccelRange {
    /// Decode the full-scale bits (`ACCEL_CONFIG & 0x18`). Unknown values
    /// fall back to ±16 g.
    pub fn from_config_bits(bits: u8) -> Self {
        match bits & 0x18 {
            0x00 => Self::G2,
            0x08 => Self::G4,
            0x10 => Self::G8,
            _ => Self::G16,
        }
    }

    pub fn full_scale_g(self) -> f32 {
        match self {
            Self::G2 => 2.0,
            Self::G4 => 4.0,
            Self::G8 => 8.0,
            Self::G16 => 16.0,
        }
    }

    /// g per LSB of a signed 16-bit reading.
    pub fn sensitivity(self) -> f32 {
        self.full_scale_g() / 32768.0
    }
}

/// Convert one raw axis reading to m/s².
pub fn raw_to_ms2(raw: i16, range: AccelRange) -> f32 {
    raw as f32 * range.sensitivity() * CONVERT_G_TO_MS2
}

/// Serialize one three-axis sample as little-endian `f32`s.
pub fn axes_to_bytes(axes: [f32; 3]) -> [u8; 12] {
    let mut out = [0u8; 12];
    for (dst, value) in out.chunks_exact_mut(4).zip(axes) {
        dst.copy_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decode three-axis samples written by [`axes_to_bytes`].
pub fn axes_from_bytes(bytes: &[u8]) -> impl Iterator<Item = [f32; 3]> + '_ {
    bytes.chunks_exact(12).map(|chunk| {
        let axis = |i: usize| {
            f32::from_le_bytes([chunk[i * 4], chunk[i * 4 + 1], chunk[i * 4 + 2], chunk[i * 4 + 3]])
        };
        [axis(0), axis(1), axis(2)]
    })
}
