//! Blocking wrappers around the Xcode command-line tools used by xcshots.
//!
//! Each wrapper shells out to one tool, waits for it to finish, and turns
//! its structured output into typed values:
//! - `simctl`: device listing and boot
//! - `xcodebuild`: `xcodebuild test` with captured output
//! - `xcresulttool`: attachment export from a result bundle

use std::io;
use thiserror::Error;

pub mod simctl;
pub mod xcodebuild;
pub mod xcresulttool;

pub use simctl::{boot_device, list_devices, parse_device_list, DeviceDescriptor, PowerState};
pub use xcodebuild::{run_test, TestInvocation, TestOutput};
pub use xcresulttool::{export_attachments, MANIFEST_FILE};

/// Errors from invoking an Xcode tool
#[derive(Debug, Error)]
pub enum XcrunError {
    #[error("{tool} failed: {message}")]
    CommandFailed { tool: String, message: String },

    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for tool invocations
pub type XcrunResult<T> = Result<T, XcrunError>;

/// Build a `CommandFailed` error from a finished process' stderr.
pub(crate) fn command_failed(tool: &str, stderr: &[u8]) -> XcrunError {
    let stderr = String::from_utf8_lossy(stderr);
    let message = match stderr.trim() {
        "" => "exited with non-zero status".to_string(),
        s => s.to_string(),
    };
    XcrunError::CommandFailed {
        tool: tool.to_string(),
        message,
    }
}
