//! `xcodebuild test` invocation.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{XcrunError, XcrunResult};

/// Everything needed to run one `xcodebuild test`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInvocation {
    /// Project file (e.g., "ImmichLens.xcodeproj")
    pub project: String,

    /// Scheme name
    pub scheme: String,

    /// Test plan name without the `.xctestplan` extension
    pub test_plan: String,

    /// Destination platform (e.g., "tvOS Simulator")
    pub platform: String,

    /// UDID of the destination device
    pub device_id: String,

    /// Where xcodebuild writes the result bundle
    pub result_bundle: PathBuf,

    /// Extra flags appended verbatim
    pub extra_flags: Vec<String>,
}

impl TestInvocation {
    /// The `-destination` expression
    pub fn destination(&self) -> String {
        format!("platform={},id={}", self.platform, self.device_id)
    }

    /// Full argv after the `xcodebuild` program name
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "test".to_string(),
            "-project".to_string(),
            self.project.clone(),
            "-scheme".to_string(),
            self.scheme.clone(),
            "-testPlan".to_string(),
            self.test_plan.clone(),
            "-destination".to_string(),
            self.destination(),
            "-resultBundlePath".to_string(),
            self.result_bundle.to_string_lossy().to_string(),
        ];
        args.extend(self.extra_flags.iter().cloned());
        args
    }
}

/// Exit status and captured output of a finished test run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,

    /// Standard output followed by standard error
    pub combined_output: String,
}

impl TestOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The last `n` lines of the combined output
    pub fn tail(&self, n: usize) -> Vec<&str> {
        let lines: Vec<&str> = self.combined_output.lines().collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }
}

/// Run `xcodebuild test` in `work_dir` and wait for it to finish.
///
/// A non-zero exit is not an error here; the caller classifies the outcome
/// from `TestOutput::exit_code`.
pub fn run_test(invocation: &TestInvocation, work_dir: &Path) -> XcrunResult<TestOutput> {
    let args = invocation.to_args();
    tracing::debug!(?args, work_dir = %work_dir.display(), "running xcodebuild");

    let output = Command::new("xcodebuild")
        .args(&args)
        .current_dir(work_dir)
        .output()
        .map_err(|source| XcrunError::Spawn {
            tool: "xcodebuild".to_string(),
            source,
        })?;

    let mut combined_output = String::from_utf8_lossy(&output.stdout).into_owned();
    combined_output.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(TestOutput {
        exit_code: output.status.code(),
        combined_output,
    })
}
