//! Capture pipeline
//!
//! One strictly sequential attempt per invocation:
//! 1. Validate credentials (nothing touched yet)
//! 2. Generate the ephemeral test plan
//! 3. Patch the shared scheme (snapshot first; restored on every exit path)
//! 4. Reconcile the simulator
//! 5. Run the UI tests
//! 6. Export attachments and copy them out under stable names
//! 7. Restore the scheme, then remove transient artifacts

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use xcshots_xcrun::{DeviceDescriptor, XcrunError};

use crate::cleanup::{format_bytes, list_files, TransientArtifacts};
use crate::config::{ConfigError, LaneConfig, LanePaths};
use crate::credentials::{Credentials, CredentialsError};
use crate::device::{self, DeviceError};
use crate::executor::{self, ExecutorError};
use crate::extract::{self, ExtractError, StagedExport};
use crate::normalize::{NameNormalizer, SavedScreenshot};
use crate::plan::TestPlan;
use crate::progress::Progress;
use crate::scheme::{RestoreRegistry, SchemeError, SchemeGuard};
use crate::tools::Toolset;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Required environment values are missing
    #[error("{0}")]
    Configuration(#[from] CredentialsError),

    /// The shared scheme does not have the expected shape
    #[error("{0}")]
    SchemeStructure(SchemeError),

    #[error("Simulator '{name}' not found")]
    DeviceNotFound {
        name: String,
        hint: String,
        candidates: Vec<DeviceDescriptor>,
    },

    /// The test tool reported failure
    #[error("xcodebuild test failed ({})", executor::describe_exit(.exit_code))]
    TestExecution {
        exit_code: Option<i32>,
        tail: Vec<String>,
    },

    /// The test run succeeded but exported nothing
    #[error("{0}")]
    NoScreenshots(ExtractError),

    #[error("{0}")]
    Manifest(ExtractError),

    #[error("{0}")]
    Tool(#[from] XcrunError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    SchemeIo(SchemeError),

    #[error("invalid attachment extension: {0}")]
    Extension(#[from] regex_lite::Error),
}

impl From<SchemeError> for PipelineError {
    fn from(e: SchemeError) -> Self {
        if e.is_structural() {
            PipelineError::SchemeStructure(e)
        } else {
            PipelineError::SchemeIo(e)
        }
    }
}

impl From<DeviceError> for PipelineError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::NotFound {
                name,
                hint,
                candidates,
            } => PipelineError::DeviceNotFound {
                name,
                hint,
                candidates,
            },
            DeviceError::Tool(e) => PipelineError::Tool(e),
        }
    }
}

impl From<ExecutorError> for PipelineError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Failed { exit_code, tail } => {
                PipelineError::TestExecution { exit_code, tail }
            }
            ExecutorError::Tool(e) => PipelineError::Tool(e),
            ExecutorError::Io(e) => PipelineError::Io(e),
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::NoManifest { .. } => PipelineError::NoScreenshots(e),
            ExtractError::InvalidManifest(_) => PipelineError::Manifest(e),
            ExtractError::Tool(e) => PipelineError::Tool(e),
            ExtractError::Io(e) => PipelineError::Io(e),
        }
    }
}

impl PipelineError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Configuration(_) => 1,
            PipelineError::SchemeStructure(_) => 2,
            PipelineError::DeviceNotFound { .. } => 20,
            PipelineError::Tool(_) => 30,
            PipelineError::TestExecution { .. } => 50,
            PipelineError::NoScreenshots(_) => 60,
            PipelineError::Manifest(_) => 61,
            PipelineError::Io(_) => 1,
            PipelineError::SchemeIo(_) => 1,
            PipelineError::Extension(_) => 1,
        }
    }

    /// Extra lines for the operator, printed before the failure line
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            PipelineError::DeviceNotFound {
                hint, candidates, ..
            } => {
                let mut lines = vec![format!("Available simulators matching '{}':", hint)];
                if candidates.is_empty() {
                    lines.push("  (none)".to_string());
                }
                for device in candidates {
                    lines.push(format!("  {} ({}) [{}]", device.name, device.udid, device.state));
                }
                Some(lines.join("\n"))
            }
            PipelineError::TestExecution { tail, .. } if !tail.is_empty() => Some(tail.join("\n")),
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Outcome of a successful capture
#[derive(Debug, Clone)]
pub struct CaptureReport {
    /// Device the tests ran on
    pub device: DeviceDescriptor,

    /// Screenshots written, in manifest order
    pub screenshots: Vec<SavedScreenshot>,

    /// Output directory
    pub output_dir: PathBuf,

    /// Final directory listing: (file name, size in bytes)
    pub files: Vec<(String, u64)>,
}

/// One capture run
pub struct Pipeline<'a> {
    config: LaneConfig,
    paths: LanePaths,
    tools: Toolset<'a>,
    restore: RestoreRegistry,
    progress: Progress,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: LaneConfig,
        root: &Path,
        tools: Toolset<'a>,
        restore: RestoreRegistry,
        progress: Progress,
    ) -> Self {
        let paths = LanePaths::resolve(root, &config);
        Self {
            config,
            paths,
            tools,
            restore,
            progress,
        }
    }

    pub fn paths(&self) -> &LanePaths {
        &self.paths
    }

    /// Run using the process environment for credentials
    pub fn run_from_env(&self) -> PipelineResult<CaptureReport> {
        self.run(|key| std::env::var(key).ok())
    }

    /// Run the whole capture, reading credentials through `lookup`
    pub fn run<F>(&self, lookup: F) -> PipelineResult<CaptureReport>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::from_lookup(lookup)?;
        self.config.validate()?;
        let normalizer = NameNormalizer::new(&self.config.attachment_type)?;

        // Declared before the scheme guard so it is dropped after it
        let mut transient = TransientArtifacts::new(vec![
            self.paths.test_plan.clone(),
            self.paths.result_bundle.clone(),
        ]);
        self.restore.track(transient.paths().iter().cloned());

        TestPlan::generate(&credentials, &self.config).write(&self.paths.test_plan)?;
        self.progress.step(format!("Generated {}", self.config.test_plan));

        let (device, screenshots, staged) = {
            let guard = SchemeGuard::capture(&self.paths.scheme, &self.restore, self.progress)?;
            guard.patch(&self.config.plan_reference())?;
            self.progress.step("Patched scheme to use test plan");

            let captured = self.capture(&normalizer)?;
            guard.restore()?;
            captured
        };

        staged.close()?;
        transient.cleanup()?;
        self.restore.untrack_all();
        self.progress.step("Cleaned up temporary files");

        let files = list_files(&self.paths.output_dir)?;
        for (name, size) in &files {
            self.progress
                .detail(format!("  {}  ({} bytes)", name, format_bytes(*size)));
        }

        Ok(CaptureReport {
            device,
            screenshots,
            output_dir: self.paths.output_dir.clone(),
            files,
        })
    }

    /// Steps that run while the scheme is patched
    fn capture(
        &self,
        normalizer: &NameNormalizer,
    ) -> PipelineResult<(DeviceDescriptor, Vec<SavedScreenshot>, StagedExport)> {
        let device = device::reconcile(self.tools.devices, &self.config.device, &self.progress)?;

        executor::clear_previous_results(&self.paths)?;

        self.progress.detail("Running UI tests...");
        let invocation = executor::build_invocation(&self.config, &self.paths, &device);
        executor::execute(
            self.tools.runner,
            &invocation,
            &self.paths.root,
            self.config.tail_lines,
        )?;
        self.progress.step("Tests complete");

        let staged = extract::extract(
            self.tools.exporter,
            &self.paths.result_bundle,
            &self.config.attachment_type,
        )?;
        self.restore.track([staged.dir().to_path_buf()]);
        self.progress
            .step(format!("Extracted attachments to {}", staged.dir().display()));

        let screenshots = normalizer.copy_all(
            staged.entries(),
            staged.dir(),
            &self.paths.output_dir,
            &self.progress,
        )?;
        self.progress
            .step(format!("Screenshots saved to {}/", self.config.output_dir));

        Ok((device, screenshots, staged))
    }
}
