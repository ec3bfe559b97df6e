/// Block-addressed byte store backing the capture record.
///
/// Offsets are absolute byte offsets from the start of the region. Erase
/// works on whole blocks: `offset` must be block aligned and `len` is rounded
/// up to the next block boundary.
pub trait StorageRegion: Send {
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), String>;

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), String>;

    fn erase_at(&mut self, offset: usize, len: usize) -> Result<(), String>;

    fn block_size(&self) -> usize;

    /// Total addressable bytes.
    fn capacity(&self) -> usize;
}

/// Round `len` up to a whole number of `block_size` blocks.
pub fn align_to_block(len: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return len;
    }
    len.div_ceil(block_size) * block_size
}
