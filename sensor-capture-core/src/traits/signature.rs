/// Incremental signature over the captured byte stream.
///
/// The session feeds the reference trailer and then every sample byte, in
/// order, and calls [`SignatureContext::finish`] once at the end.
pub trait SignatureContext: Send {
    /// Absorb `data` into the running signature.
    fn update(&mut self, data: &[u8]) -> Result<(), String>;

    /// Write the raw digest into the front of `out` and return its length.
    ///
    /// `out` must hold at least `2 * digest_len()` bytes so the caller can
    /// hex-expand in place.
    fn finish(&mut self, out: &mut [u8]) -> Result<usize, String>;

    /// Discard any absorbed data and start a fresh signature.
    fn reset(&mut self);

    /// Length of the raw digest in bytes.
    fn digest_len(&self) -> usize;

    /// Algorithm identifier written into the header (e.g. "HS256").
    fn algorithm(&self) -> &str;
}
