use std::fs;
use std::path::{Path, PathBuf};

use crate::models::capture_report::CaptureReport;

/// Sidecar path for a storage image: `{image}.report.json`.
pub fn report_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("report.json")
}

/// Write a capture report as a JSON sidecar next to the storage image.
pub fn write_report(report: &CaptureReport, image_path: &Path) -> Result<PathBuf, String> {
    let path = report_path(image_path);
    let json = serde_json::to_string_pretty(report).map_err(|e| format!("failed to serialize report: {}", e))?;
    fs::write(&path, json).map_err(|e| format!("failed to write report: {}", e))?;
    Ok(path)
}

/// Read the capture report sidecar of a storage image.
pub fn read_report(image_path: &Path) -> Result<CaptureReport, String> {
    let json = fs::read_to_string(report_path(image_path)).map_err(|e| format!("failed to read report: {}", e))?;
    serde_json::from_str(&json).map_err(|e| format!("failed to parse report: {}", e))
}
