use crate::models::config::FrameErrorPolicy;
use crate::models::error::{CaptureError, FailureStage};
use crate::traits::signature::SignatureContext;
use crate::traits::storage_region::StorageRegion;

/// Record-to-storage sink: appends frame bytes after the header and feeds the
/// same bytes into the running signature.
///
/// The last frame is clipped so exactly `target` bytes land on storage;
/// frames arriving after the target is reached are ignored.
#[derive(Debug)]
pub struct StorageSink {
    header_offset: usize,
    target: usize,
    bytes_written: usize,
    policy: FrameErrorPolicy,
    write_failures: u64,
    update_failures: u64,
}

impl StorageSink {
    pub fn new(header_offset: usize, target: usize, policy: FrameErrorPolicy) -> Self {
        Self {
            header_offset,
            target,
            bytes_written: 0,
            policy,
            write_failures: 0,
            update_failures: 0,
        }
    }

    /// Write and sign one frame. Returns `true` once the target is reached.
    ///
    /// Under [`FrameErrorPolicy::Continue`] a failed write or update is
    /// logged and counted, and the offset still advances.
    pub fn accept(
        &mut self,
        bytes: &[u8],
        storage: &mut dyn StorageRegion,
        signer: &mut dyn SignatureContext,
    ) -> Result<bool, CaptureError> {
        if self.is_complete() {
            return Ok(true);
        }
        let take = bytes.len().min(self.target - self.bytes_written);
        let chunk = &bytes[..take];
        let offset = self.header_offset + self.bytes_written;

        if let Err(e) = storage.write_at(offset, chunk) {
            self.write_failures += 1;
            log::error!("Failed to write {} bytes at {}: {}", take, offset, e);
            if self.policy == FrameErrorPolicy::Abort {
                return Err(CaptureError::StorageWriteFailure {
                    stage: FailureStage::Sampling,
                    reason: e,
                });
            }
        }

        if let Err(e) = signer.update(chunk) {
            self.update_failures += 1;
            log::error!("Failed to update signature at {}: {}", offset, e);
            if self.policy == FrameErrorPolicy::Abort {
                return Err(CaptureError::SignatureUpdateFailure {
                    stage: FailureStage::Sampling,
                    reason: e,
                });
            }
        }

        self.bytes_written += take;
        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_written >= self.target
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    pub fn update_failures(&self) -> u64 {
        self.update_failures
    }
}
