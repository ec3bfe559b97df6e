use crate::models::capture_report::CaptureReport;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::session::inference::WindowStatus;

/// Event delegate for capture session notifications.
///
/// All methods are called from the consumer task.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called after each double-buffer window completes.
    fn on_window(&self, index: u64, status: WindowStatus);

    /// Called when a session aborts.
    fn on_error(&self, error: &CaptureError);

    /// Called when a record has been sealed.
    fn on_capture_finished(&self, report: &CaptureReport);
}
