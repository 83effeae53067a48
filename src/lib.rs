//! xcshots - screenshot capture for Xcode UI tests
//!
//! Runs a screenshot UI test target against a simulator and copies the
//! captured attachments out under stable names. The shared scheme is
//! pointed at an ephemeral test plan for the duration of the run and
//! restored byte-for-byte afterwards, including on failure and interrupt.

pub mod cleanup;
pub mod config;
pub mod credentials;
pub mod device;
pub mod executor;
pub mod extract;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod scheme;
pub mod signal;
pub mod tools;

pub use config::{LaneConfig, LanePaths, Overrides};
pub use credentials::{Credentials, CredentialsError};
pub use pipeline::{CaptureReport, Pipeline, PipelineError, PipelineResult};
pub use progress::Progress;
pub use scheme::{RestoreRegistry, SchemeGuard};
pub use signal::{SignalHandler, EXIT_CODE_INTERRUPTED};
pub use tools::{AttachmentExporter, DeviceControl, TestRunner, Toolset, XcrunTools};
