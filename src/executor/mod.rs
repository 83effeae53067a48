//! Test run execution
//!
//! Runs `xcodebuild test` once against the reconciled device with the
//! generated plan. Success is decided solely by the exit status; on failure
//! the tail of the combined output is kept for the operator.

use std::io;
use std::path::Path;

use thiserror::Error;
use xcshots_xcrun::{DeviceDescriptor, TestInvocation, TestOutput, XcrunError};

use crate::cleanup::remove_path;
use crate::config::{LaneConfig, LanePaths};
use crate::tools::TestRunner;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("xcodebuild test failed ({})", describe_exit(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        tail: Vec<String>,
    },

    #[error(transparent)]
    Tool(#[from] XcrunError),

    #[error("failed to clear previous results: {0}")]
    Io(#[from] io::Error),
}

pub(crate) fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Build the invocation for `device`
pub fn build_invocation(
    config: &LaneConfig,
    paths: &LanePaths,
    device: &DeviceDescriptor,
) -> TestInvocation {
    TestInvocation {
        project: config.project.clone(),
        scheme: config.scheme.clone(),
        test_plan: config.test_plan_name(),
        platform: config.device.platform.clone(),
        device_id: device.udid.clone(),
        result_bundle: paths.result_bundle.clone(),
        extra_flags: config.extra_test_flags.clone(),
    }
}

/// Remove result bundle and output directory left by an earlier run
pub fn clear_previous_results(paths: &LanePaths) -> io::Result<()> {
    remove_path(&paths.result_bundle)?;
    remove_path(&paths.output_dir)
}

/// Run the tests and classify the outcome
pub fn execute(
    runner: &dyn TestRunner,
    invocation: &TestInvocation,
    work_dir: &Path,
    tail_lines: usize,
) -> Result<TestOutput, ExecutorError> {
    let output = runner.run_test(invocation, work_dir)?;
    tracing::debug!(
        exit_code = ?output.exit_code,
        output_lines = output.combined_output.lines().count(),
        "xcodebuild finished"
    );

    if !output.success() {
        return Err(ExecutorError::Failed {
            exit_code: output.exit_code,
            tail: output.tail(tail_lines).into_iter().map(String::from).collect(),
        });
    }

    Ok(output)
}
