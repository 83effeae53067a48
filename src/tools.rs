//! Seams to the external Xcode tools.
//!
//! The pipeline talks to simctl, xcodebuild and xcresulttool only through
//! these traits. `XcrunTools` is the real implementation; tests supply
//! in-process fakes.

use std::path::Path;

use xcshots_xcrun::{DeviceDescriptor, TestInvocation, TestOutput, XcrunResult};

/// Device-control service
pub trait DeviceControl {
    /// All known devices, or only those simctl reports as available
    fn list_devices(&self, available_only: bool) -> XcrunResult<Vec<DeviceDescriptor>>;

    /// Boot a device by UDID
    fn boot(&self, udid: &str) -> XcrunResult<()>;
}

/// Build-and-test execution tool
pub trait TestRunner {
    /// Run the tests to completion; a failing test run is still `Ok`
    fn run_test(&self, invocation: &TestInvocation, work_dir: &Path) -> XcrunResult<TestOutput>;
}

/// Result-archive export tool
pub trait AttachmentExporter {
    /// Export attachments of `attachment_type` plus a manifest into `output_dir`
    fn export_attachments(
        &self,
        result_bundle: &Path,
        output_dir: &Path,
        attachment_type: &str,
    ) -> XcrunResult<()>;
}

/// The real tools, via `xcrun` and `xcodebuild`
#[derive(Debug, Clone, Copy, Default)]
pub struct XcrunTools;

impl DeviceControl for XcrunTools {
    fn list_devices(&self, available_only: bool) -> XcrunResult<Vec<DeviceDescriptor>> {
        xcshots_xcrun::list_devices(available_only)
    }

    fn boot(&self, udid: &str) -> XcrunResult<()> {
        xcshots_xcrun::boot_device(udid)
    }
}

impl TestRunner for XcrunTools {
    fn run_test(&self, invocation: &TestInvocation, work_dir: &Path) -> XcrunResult<TestOutput> {
        xcshots_xcrun::run_test(invocation, work_dir)
    }
}

impl AttachmentExporter for XcrunTools {
    fn export_attachments(
        &self,
        result_bundle: &Path,
        output_dir: &Path,
        attachment_type: &str,
    ) -> XcrunResult<()> {
        xcshots_xcrun::export_attachments(result_bundle, output_dir, attachment_type)
    }
}

/// The three tools a pipeline run needs
#[derive(Clone, Copy)]
pub struct Toolset<'a> {
    pub devices: &'a dyn DeviceControl,
    pub runner: &'a dyn TestRunner,
    pub exporter: &'a dyn AttachmentExporter,
}

static XCRUN: XcrunTools = XcrunTools;

impl Toolset<'static> {
    /// Toolset backed by the installed Xcode
    pub fn xcrun() -> Self {
        Self {
            devices: &XCRUN,
            runner: &XCRUN,
            exporter: &XCRUN,
        }
    }
}
