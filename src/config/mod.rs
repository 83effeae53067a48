//! Lane configuration
//!
//! Two layers, applied in order:
//! 1. Built-in defaults (see `defaults`)
//! 2. Repo config file (`.xcshots.toml`, every key optional)
//!
//! CLI flags are applied on top by the binary via `Overrides`.

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("test_plan must end in .xctestplan, got {0}")]
    TestPlanExtension(String),

    #[error("tail_lines must be greater than zero")]
    ZeroTail,
}

/// The UI test target the generated plan points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target name (e.g., "ImmichLensUITests")
    pub name: String,

    /// Target identifier from the Xcode project
    pub identifier: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: defaults::TEST_TARGET_NAME.to_string(),
            identifier: defaults::TEST_TARGET_IDENTIFIER.to_string(),
        }
    }
}

/// Which simulator to run on and how to bring it up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Exact simulator name
    pub name: String,

    /// xcodebuild destination platform
    pub platform: String,

    /// Case-insensitive substring used to list candidates when no match exists
    pub candidate_hint: String,

    /// Seconds to wait after issuing a boot
    pub boot_settle_seconds: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: defaults::SIMULATOR_NAME.to_string(),
            platform: defaults::PLATFORM.to_string(),
            candidate_hint: defaults::CANDIDATE_HINT.to_string(),
            boot_settle_seconds: defaults::BOOT_SETTLE_SECONDS,
        }
    }
}

/// Effective lane configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Xcode project, relative to the project root
    pub project: String,

    /// Shared scheme name
    pub scheme: String,

    /// Generated test plan file, relative to the project root
    pub test_plan: String,

    /// Result bundle path, relative to the project root
    pub result_bundle: String,

    /// Screenshot output directory, relative to the project root
    pub output_dir: String,

    /// Attachment type passed to the exporter; also the expected file extension
    pub attachment_type: String,

    /// Lines of test output shown when the test run fails
    pub tail_lines: usize,

    /// Flags appended to `xcodebuild test`
    pub extra_test_flags: Vec<String>,

    pub target: TargetConfig,

    pub device: DeviceConfig,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            project: defaults::PROJECT.to_string(),
            scheme: defaults::SCHEME.to_string(),
            test_plan: defaults::TEST_PLAN.to_string(),
            result_bundle: defaults::RESULT_BUNDLE.to_string(),
            output_dir: defaults::OUTPUT_DIR.to_string(),
            attachment_type: defaults::ATTACHMENT_TYPE.to_string(),
            tail_lines: defaults::TAIL_LINES,
            extra_test_flags: defaults::EXTRA_TEST_FLAGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            target: TargetConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub simulator: Option<String>,
    pub output_dir: Option<String>,
    pub boot_settle_seconds: Option<u64>,
}

impl LaneConfig {
    /// Load a config file, filling unspecified keys from the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    /// Parse a TOML document
    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Load the explicit config file if given, else `.xcshots.toml` under
    /// `root` when it exists, else the built-in defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = root.join(defaults::CONFIG_FILE);
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply CLI overrides
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(ref name) = overrides.simulator {
            self.device.name = name.clone();
        }
        if let Some(ref dir) = overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(secs) = overrides.boot_settle_seconds {
            self.device.boot_settle_seconds = secs;
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("project", &self.project),
            ("scheme", &self.scheme),
            ("test_plan", &self.test_plan),
            ("result_bundle", &self.result_bundle),
            ("output_dir", &self.output_dir),
            ("attachment_type", &self.attachment_type),
            ("target.name", &self.target.name),
            ("target.identifier", &self.target.identifier),
            ("device.name", &self.device.name),
            ("device.platform", &self.device.platform),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField { field });
            }
        }

        if !self.test_plan.ends_with(".xctestplan") {
            return Err(ConfigError::TestPlanExtension(self.test_plan.clone()));
        }

        if self.tail_lines == 0 {
            return Err(ConfigError::ZeroTail);
        }

        Ok(())
    }

    /// Logical plan name passed to `-testPlan` (file stem)
    pub fn test_plan_name(&self) -> String {
        Path::new(&self.test_plan)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.test_plan.clone())
    }

    /// Container reference for the project (`container:<project>`)
    pub fn project_container(&self) -> String {
        format!("container:{}", self.project)
    }

    /// Container reference the scheme uses for the plan (`container:<plan>`)
    pub fn plan_reference(&self) -> String {
        format!("container:{}", self.test_plan)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Fixed filesystem locations for one run, resolved against the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanePaths {
    pub root: PathBuf,
    pub test_plan: PathBuf,
    pub scheme: PathBuf,
    pub result_bundle: PathBuf,
    pub output_dir: PathBuf,
}

impl LanePaths {
    /// Resolve every location under `root`.
    ///
    /// A relative root is anchored to the current directory. xcodebuild runs
    /// inside the root while export and cleanup run from the process
    /// directory, so every resolved path is absolute.
    pub fn resolve(root: &Path, config: &LaneConfig) -> Self {
        let root = absolute_root(root);
        Self {
            test_plan: root.join(&config.test_plan),
            scheme: root
                .join(&config.project)
                .join("xcshareddata")
                .join("xcschemes")
                .join(format!("{}.xcscheme", config.scheme)),
            result_bundle: root.join(&config.result_bundle),
            output_dir: root.join(&config.output_dir),
            root,
        }
    }
}

fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(root),
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "cannot resolve relative root");
            root.to_path_buf()
        }
    }
}
