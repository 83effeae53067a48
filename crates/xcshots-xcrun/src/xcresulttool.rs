//! Attachment export via `xcrun xcresulttool export attachments`.
//!
//! The tool writes every matching attachment into the output directory
//! under a generated file name and describes them in `manifest.json`.

use std::path::Path;
use std::process::Command;

use crate::{command_failed, XcrunError, XcrunResult};

/// File name of the manifest xcresulttool writes next to the attachments
pub const MANIFEST_FILE: &str = "manifest.json";

fn export_args(result_bundle: &Path, output_dir: &Path, attachment_type: &str) -> Vec<String> {
    vec![
        "xcresulttool".to_string(),
        "export".to_string(),
        "attachments".to_string(),
        "--path".to_string(),
        result_bundle.to_string_lossy().to_string(),
        "--output-path".to_string(),
        output_dir.to_string_lossy().to_string(),
        "--type".to_string(),
        attachment_type.to_string(),
    ]
}

/// Export attachments of `attachment_type` (e.g., "png") from a result bundle.
pub fn export_attachments(
    result_bundle: &Path,
    output_dir: &Path,
    attachment_type: &str,
) -> XcrunResult<()> {
    let args = export_args(result_bundle, output_dir, attachment_type);
    tracing::debug!(?args, "exporting attachments");

    let output = Command::new("xcrun")
        .args(&args)
        .output()
        .map_err(|source| XcrunError::Spawn {
            tool: "xcresulttool".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(command_failed("xcresulttool export", &output.stderr));
    }

    Ok(())
}
