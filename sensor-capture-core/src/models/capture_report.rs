use serde::{Deserialize, Serialize};

use super::sensor_models::SessionDiagnostics;

/// Result returned when a record session has been sealed.
///
/// Serializable for the JSON sidecar written next to a storage image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub id: String,
    pub created_at: String,
    pub label: String,
    pub target_bytes: usize,
    pub bytes_captured: u64,
    pub header_offset: usize,
    /// Lowercase hex digest sealed into block 0.
    pub digest: String,
    pub signature_algorithm: String,
    pub queue_depth: usize,
    pub queue_high_water: usize,
    pub frame_write_failures: u64,
    pub signature_update_failures: u64,
    /// Oversized frames refused before reaching the queue.
    #[serde(default)]
    pub frames_rejected: u64,
}

impl CaptureReport {
    pub fn new(
        label: &str,
        target_bytes: usize,
        header_offset: usize,
        digest: &str,
        signature_algorithm: &str,
        queue_depth: usize,
        diagnostics: &SessionDiagnostics,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            label: label.to_string(),
            target_bytes,
            bytes_captured: diagnostics.bytes_written,
            header_offset,
            digest: digest.to_string(),
            signature_algorithm: signature_algorithm.to_string(),
            queue_depth,
            queue_high_water: diagnostics.queue_high_water,
            frame_write_failures: diagnostics.frame_write_failures,
            signature_update_failures: diagnostics.signature_update_failures,
            frames_rejected: diagnostics.frames_rejected,
        }
    }

    /// End of the used storage range, `[0, used_end)`.
    pub fn used_end(&self) -> u64 {
        self.header_offset as u64 + self.bytes_captured
    }

    /// The queue filled completely at least once during the session.
    pub fn queue_overran(&self) -> bool {
        self.queue_high_water >= self.queue_depth
    }

    /// Every frame delivered by the source was written and signed.
    pub fn is_clean(&self) -> bool {
        self.frame_write_failures == 0 && self.signature_update_failures == 0 && self.frames_rejected == 0
    }
}
