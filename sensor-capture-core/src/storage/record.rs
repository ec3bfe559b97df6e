//! Binary layout of a capture record at storage offset 0.
//!
//! ```text
//! [0, end_of_header)              serialized header, hex digest slot at signature_index
//! [end_of_header, header_offset)  reference trailer
//! [header_offset, ..)             sample data
//! ```
//!
//! Reference trailer:
//! ```text
//! [0x60 + tag_len + padding] [tag bytes] [padding × 0x20] [0xFF]
//! ```
//! The first byte is a CBOR text-string head, so `tag_len + padding` must
//! stay within the 23-byte short form.

use crate::traits::header_builder::HeaderBlock;

/// Base of the trailer length byte (CBOR major type 3, text string).
pub const TRAILER_LENGTH_BASE: u8 = 0x60;
/// Largest length encodable in the short form head.
pub const TRAILER_MAX_INLINE_LEN: usize = 23;
pub const TRAILER_PAD_BYTE: u8 = b' ';
pub const TRAILER_SENTINEL: u8 = 0xFF;

/// Offsets of one composed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub end_of_header: usize,
    pub trailer_len: usize,
    /// Where sample data starts; also the length persisted at offset 0.
    pub header_offset: usize,
    pub signature_index: usize,
}

/// Whether the digest slot of a record still holds the placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealState {
    Sealed(String),
    Unsealed,
}

/// Length of the real header content: one past the last non-zero byte,
/// scanning backward from the end of the buffer. `None` if every byte is zero.
pub fn find_end_of_header(buffer: &[u8]) -> Option<usize> {
    buffer.iter().rposition(|&b| b != 0).map(|ix| ix + 1)
}

/// Spaces needed to bring `header_len` up to a multiple of four.
pub fn trailer_padding(header_len: usize) -> usize {
    match header_len % 4 {
        0 => 0,
        rem => 4 - rem,
    }
}

/// Build the reference trailer that follows a header of `header_len` bytes.
pub fn build_reference_trailer(tag: &str, header_len: usize) -> Result<Vec<u8>, String> {
    let tag = tag.as_bytes();
    let padding = trailer_padding(header_len);
    if tag.len() + padding > TRAILER_MAX_INLINE_LEN {
        return Err(format!(
            "reference tag too long: {} + {} padding exceeds {}",
            tag.len(),
            padding,
            TRAILER_MAX_INLINE_LEN
        ));
    }

    let mut trailer = Vec::with_capacity(tag.len() + padding + 2);
    trailer.push(TRAILER_LENGTH_BASE + (tag.len() + padding) as u8);
    trailer.extend_from_slice(tag);
    trailer.resize(trailer.len() + padding, TRAILER_PAD_BYTE);
    trailer.push(TRAILER_SENTINEL);
    Ok(trailer)
}

/// Cut the templated header at its real end and append the reference
/// trailer. Returns the bytes to persist at offset 0 and their layout.
pub fn compose_record_header(header: &HeaderBlock, tag: &str) -> Result<(Vec<u8>, RecordLayout), String> {
    let end_of_header = find_end_of_header(&header.bytes).ok_or("failed to find end of header")?;
    let trailer = build_reference_trailer(tag, end_of_header)?;

    let mut bytes = Vec::with_capacity(end_of_header + trailer.len());
    bytes.extend_from_slice(&header.bytes[..end_of_header]);
    bytes.extend_from_slice(&trailer);

    let layout = RecordLayout {
        end_of_header,
        trailer_len: trailer.len(),
        header_offset: bytes.len(),
        signature_index: header.signature_index,
    };
    Ok((bytes, layout))
}

fn hex_digit(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        _ => b'a' + nibble - 10,
    }
}

/// Lowercase hex of `bytes` into `out`, two characters per byte.
pub fn hex_encode_into(bytes: &[u8], out: &mut [u8]) -> Result<(), String> {
    if out.len() < bytes.len() * 2 {
        return Err(format!("hex buffer too small: {} < {}", out.len(), bytes.len() * 2));
    }
    for (byte, pair) in bytes.iter().zip(out.chunks_exact_mut(2)) {
        pair[0] = hex_digit(byte >> 4);
        pair[1] = hex_digit(byte & 0x0F);
    }
    Ok(())
}

pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Write `digest` as hex into `block` at `signature_index`.
pub fn patch_digest(block: &mut [u8], signature_index: usize, digest: &[u8]) -> Result<(), String> {
    let end = signature_index + digest.len() * 2;
    if end > block.len() {
        return Err(format!(
            "digest slot [{}, {}) outside block of {} bytes",
            signature_index,
            end,
            block.len()
        ));
    }
    hex_encode_into(digest, &mut block[signature_index..end])
}

/// Inspect the digest slot of a record's first block.
///
/// A slot of placeholder bytes (`'0'` or `0x00`) means the session failed
/// between header persistence and the digest patch.
pub fn seal_state(block: &[u8], signature_index: usize, digest_len: usize) -> SealState {
    let end = signature_index + digest_len * 2;
    let Some(slot) = block.get(signature_index..end) else {
        return SealState::Unsealed;
    };
    if slot.iter().all(|&b| b == b'0' || b == 0) {
        return SealState::Unsealed;
    }
    match std::str::from_utf8(slot) {
        Ok(hex) if hex.bytes().all(|b| b.is_ascii_hexdigit()) => SealState::Sealed(hex.to_string()),
        _ => SealState::Unsealed,
    }
}
