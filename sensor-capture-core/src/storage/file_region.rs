use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::memory_region::ERASED;
use crate::traits::storage_region::{align_to_block, StorageRegion};

/// Block storage backed by a fixed-size image file.
///
/// The image starts fully erased (`0xFF`). Writes overwrite in place; erase
/// fills whole blocks with `0xFF` again.
pub struct FileRegion {
    path: PathBuf,
    file: File,
    capacity: usize,
    block_size: usize,
}

impl FileRegion {
    /// Create (or truncate) an erased image of `capacity` bytes.
    pub fn create(path: impl Into<PathBuf>, capacity: usize, block_size: usize) -> Result<Self, String> {
        check_block_size(block_size)?;
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("failed to create directory: {}", e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| format!("failed to create image: {}", e))?;

        let mut region = Self {
            path,
            file,
            capacity,
            block_size,
        };
        region.fill(0, capacity)?;
        Ok(region)
    }

    /// Open an existing image; its length is the region capacity.
    pub fn open(path: impl Into<PathBuf>, block_size: usize) -> Result<Self, String> {
        check_block_size(block_size)?;
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| format!("failed to open image: {}", e))?;
        let capacity = file
            .metadata()
            .map_err(|e| format!("failed to stat image: {}", e))?
            .len() as usize;

        Ok(Self {
            path,
            file,
            capacity,
            block_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), String> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(format!(
                "range [{}, +{}) outside image of {} bytes",
                offset, len, self.capacity
            )),
        }
    }

    fn fill(&mut self, offset: usize, len: usize) -> Result<(), String> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|e| format!("seek failed: {}", e))?;
        let chunk = vec![ERASED; self.block_size.clamp(1, 4096)];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            self.file
                .write_all(&chunk[..n])
                .map_err(|e| format!("erase failed: {}", e))?;
            remaining -= n;
        }
        self.file.flush().map_err(|e| format!("flush failed: {}", e))
    }
}

fn check_block_size(block_size: usize) -> Result<(), String> {
    if block_size == 0 {
        return Err("block size must be non-zero".into());
    }
    Ok(())
}

impl StorageRegion for FileRegion {
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), String> {
        self.check_range(offset, data.len())?;
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|e| format!("seek failed: {}", e))?;
        self.file
            .write_all(data)
            .map_err(|e| format!("write failed: {}", e))
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), String> {
        self.check_range(offset, buf.len())?;
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|e| format!("seek failed: {}", e))?;
        self.file
            .read_exact(buf)
            .map_err(|e| format!("read failed: {}", e))
    }

    fn erase_at(&mut self, offset: usize, len: usize) -> Result<(), String> {
        if offset % self.block_size != 0 {
            return Err(format!("erase offset {} not block aligned", offset));
        }
        let len = align_to_block(len, self.block_size);
        self.check_range(offset, len)?;
        self.fill(offset, len)
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
