use crate::traits::storage_region::{align_to_block, StorageRegion};

/// Value of an erased byte.
pub const ERASED: u8 = 0xFF;

/// In-memory block storage with NOR flash semantics.
///
/// Erase sets whole blocks to `0xFF`; a write can only clear bits, so
/// rewriting a byte without erasing first ANDs the old and new values.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    data: Vec<u8>,
    block_size: usize,
}

impl MemoryRegion {
    pub fn new(capacity: usize, block_size: usize) -> Self {
        Self {
            data: vec![ERASED; capacity],
            block_size,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), String> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(format!(
                "range [{}, +{}) outside region of {} bytes",
                offset,
                len,
                self.data.len()
            )),
        }
    }
}

impl StorageRegion for MemoryRegion {
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), String> {
        self.check_range(offset, data.len())?;
        for (dst, &src) in self.data[offset..offset + data.len()].iter_mut().zip(data) {
            *dst &= src;
        }
        Ok(())
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), String> {
        self.check_range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn erase_at(&mut self, offset: usize, len: usize) -> Result<(), String> {
        if self.block_size == 0 {
            return Err("region has no erase block size".into());
        }
        if offset % self.block_size != 0 {
            return Err(format!("erase offset {} not block aligned", offset));
        }
        let len = align_to_block(len, self.block_size);
        self.check_range(offset, len)?;
        self.data[offset..offset + len].fill(ERASED);
        Ok(())
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}
