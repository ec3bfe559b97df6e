use crate::models::sensor_models::PayloadInfo;

/// Signature parameters the header must reserve room for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureSpec<'a> {
    pub algorithm: &'a str,
    pub digest_len: usize,
}

/// A serialized header as produced by a [`HeaderBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Fixed-capacity buffer, zero padded after `used_len`.
    pub bytes: Vec<u8>,
    pub used_len: usize,
    /// Offset of the reserved `2 * digest_len` byte hex digest slot.
    pub signature_index: usize,
}

/// Serializes the self-describing metadata header of a record.
pub trait HeaderBuilder: Send {
    fn build(&self, payload: &PayloadInfo, signature: SignatureSpec<'_>) -> Result<HeaderBlock, String>;
}
