use super::capture_report::CaptureReport;
use super::error::CaptureError;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// record:    idle → erasing_storage → sampling → sealing → completed / failed
/// inference: idle → inferencing ⟲ → idle
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    ErasingStorage,
    Sampling { bytes_captured: u64 },
    Sealing,
    Inferencing { windows: u64 },
    Completed(Box<CaptureReport>),
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_sampling(&self) -> bool {
        matches!(self, Self::Sampling { .. })
    }

    /// A session is running and owns the frame queue.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::ErasingStorage | Self::Sampling { .. } | Self::Sealing | Self::Inferencing { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Bytes captured so far, if the state tracks them.
    pub fn bytes_captured(&self) -> Option<u64> {
        match self {
            Self::Sampling { bytes_captured } => Some(*bytes_captured),
            Self::Completed(report) => Some(report.bytes_captured),
            _ => None,
        }
    }
}
