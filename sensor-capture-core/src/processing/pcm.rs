/// 16-bit PCM helpers for the microphone path.
///
/// Samples travel through the frame queue as little-endian `i16` bytes; the
/// inference path hands them to the classifier as Q15 floats.

/// Apply the front end's fixed digital gain (`sample << shift`).
///
/// Matches the two's-complement truncation of the hardware path: values that
/// overflow wrap rather than saturate.
pub fn apply_gain_shift(samples: &mut [i16], shift: u32) {
    if shift == 0 {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = sample.wrapping_shl(shift);
    }
}

/// Convert Q15 fixed point to `f32` in `[-1.0, 1.0)`.
///
/// Converts `min(src.len(), out.len())` samples.
pub fn q15_to_f32(src: &[i16], out: &mut [f32]) {
    for (dst, &sample) in out.iter_mut().zip(src) {
        *dst = sample as f32 / 32768.0;
    }
}

/// Decode little-endian `i16` samples. A trailing odd byte is ignored.
pub fn i16_samples(bytes: &[u8]) -> impl Iterator<Item = i16> + '_ {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
}

/// Encode `i16` samples as little-endian bytes into `out`.
///
/// Returns the number of bytes written.
pub fn write_i16_le(samples: &[i16], out: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, dst) in samples.iter().zip(out.chunks_exact_mut(2)) {
        dst.copy_from_slice(&sample.to_le_bytes());
        written += 2;
    }
    written
}
