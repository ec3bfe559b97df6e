//! # sensor-capture-core
//!
//! Platform-agnostic capture pipeline for a sensor node.
//!
//! Frames arrive from an interrupt-driven [`FrameSource`], cross a bounded
//! [`FrameQueue`] and are consumed by one task, either appended to block
//! storage under a running signature ([`RecordSession`]) or collected into
//! ping-pong windows for a classifier ([`InferenceSession`]). A record is
//! sealed by patching the hex digest into its already-written header.
//!
//! ## Architecture
//!
//! ```text
//! sensor-capture-core (this crate)
//! ├── traits/       ← FrameSource, StorageRegion, SignatureContext, HeaderBuilder, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, CaptureReport, SampleFrame
//! ├── processing/   ← FrameQueue, DoubleBuffer, PCM and inertial conversion
//! ├── signing/      ← HMAC-SHA256 and SHA-256 signatures
//! ├── header/       ← JSON header builder
//! ├── storage/      ← StorageSink, record layout, MemoryRegion, FileRegion, report sidecar
//! └── session/      ← RecordSession, InferenceSession
//! ```

pub mod header;
pub mod models;
pub mod processing;
pub mod session;
pub mod signing;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use header::json_header::JsonHeaderBuilder;
pub use models::capture_report::CaptureReport;
pub use models::config::{CaptureConfiguration, FrameErrorPolicy};
pub use models::error::{CaptureError, FailureStage};
pub use models::sensor_models::{ChannelDescriptor, PayloadInfo, SampleFrame, SessionDiagnostics};
pub use models::state::CaptureState;
pub use processing::double_buffer::DoubleBuffer;
pub use processing::frame_queue::{FrameProducer, FrameQueue};
pub use session::inference::{InferenceOptions, InferenceSession, WindowStatus};
pub use session::record::RecordSession;
pub use signing::{HmacSha256Signer, Sha256Signer};
pub use storage::file_region::FileRegion;
pub use storage::memory_region::MemoryRegion;
pub use storage::record::{RecordLayout, SealState};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::frame_source::FrameSource;
pub use traits::header_builder::{HeaderBlock, HeaderBuilder, SignatureSpec};
pub use traits::signature::SignatureContext;
pub use traits::storage_region::StorageRegion;
