use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Point in a capture session at which a failure was raised.
///
/// Reported alongside every [`CaptureError`] so the caller can tell an
/// unsealed record (failure after [`FailureStage::HeaderWrite`]) from one that
/// never got written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Configuration validation or session start.
    Configure,
    /// Erasing the sample area before the header is written.
    Prepare,
    /// Header templating and reference trailer construction.
    HeaderBuild,
    /// Persisting header + trailer at offset 0.
    HeaderWrite,
    /// Streaming frames through the storage sink.
    Sampling,
    /// Finalizing the running signature.
    Finalize,
    /// Re-reading block 0 for the digest patch.
    ReadBack,
    /// Erasing block 0 before the rewrite.
    BlockErase,
    /// Rewriting block 0 with the sealed digest.
    BlockRewrite,
    /// Filling a double-buffer window.
    Window,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configure => "configure",
            Self::Prepare => "prepare",
            Self::HeaderBuild => "header-build",
            Self::HeaderWrite => "header-write",
            Self::Sampling => "sampling",
            Self::Finalize => "finalize",
            Self::ReadBack => "read-back",
            Self::BlockErase => "block-erase",
            Self::BlockRewrite => "block-rewrite",
            Self::Window => "window",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during a capture session.
///
/// Header, storage and signature failures raised by the session controller
/// abort the session; there is no retry and no rollback of what was already
/// written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("header build failed: {0}")]
    HeaderBuildFailure(String),

    #[error("storage write failed during {stage}: {reason}")]
    StorageWriteFailure { stage: FailureStage, reason: String },

    #[error("storage read failed: {0}")]
    StorageReadFailure(String),

    #[error("storage erase failed during {stage}: {reason}")]
    StorageEraseFailure { stage: FailureStage, reason: String },

    #[error("signature update failed during {stage}: {reason}")]
    SignatureUpdateFailure { stage: FailureStage, reason: String },

    #[error("signature finalize failed: {0}")]
    SignatureFinalizeFailure(String),

    #[error("frame queue overrun (high-water {high_water} of {capacity})")]
    QueueOverrun { high_water: usize, capacity: usize },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("frame source failed: {0}")]
    SourceFailure(String),

    #[error("frame source stalled: no frame within {waited_ms} ms")]
    SourceStalled { waited_ms: u64 },

    #[error("invalid session state: {0}")]
    InvalidState(String),
}

impl CaptureError {
    /// The session stage this error is attributed to.
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::HeaderBuildFailure(_) => FailureStage::HeaderBuild,
            Self::StorageWriteFailure { stage, .. }
            | Self::StorageEraseFailure { stage, .. }
            | Self::SignatureUpdateFailure { stage, .. } => *stage,
            Self::StorageReadFailure(_) => FailureStage::ReadBack,
            Self::SignatureFinalizeFailure(_) => FailureStage::Finalize,
            Self::QueueOverrun { .. } => FailureStage::Window,
            Self::SourceStalled { .. } => FailureStage::Sampling,
            Self::ConfigurationFailed(_) | Self::SourceFailure(_) | Self::InvalidState(_) => {
                FailureStage::Configure
            }
        }
    }

    /// Whether the error leaves a header on storage with a placeholder digest.
    pub fn leaves_unsealed_record(&self) -> bool {
        matches!(
            self.stage(),
            FailureStage::Sampling
                | FailureStage::Finalize
                | FailureStage::ReadBack
                | FailureStage::BlockErase
                | FailureStage::BlockRewrite
        )
    }
}
