//! Test fixtures for pipeline integration tests
//!
//! This module provides:
//! - A scratch project root with the sample shared scheme installed
//! - In-process fakes for the simulator, test runner and attachment exporter
//! - Hashing helpers for byte-for-byte scheme comparisons

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use xcshots::config::LaneConfig;
use xcshots::tools::{AttachmentExporter, DeviceControl, TestRunner};
use xcshots_xcrun::{
    DeviceDescriptor, PowerState, TestInvocation, TestOutput, XcrunError, XcrunResult,
    MANIFEST_FILE,
};

pub const SIMULATOR: &str = "Apple TV 4K (3rd generation) (at 1080p)";
pub const UDID: &str = "4C6B1E0A-8D2F-4F3B-9A51-2E7C0D9B6A11";
pub const TEST_IDENTIFIER: &str = "ImmichLensUITests/testScreenshots()";

/// Path to the sample shared scheme
pub fn scheme_fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/scheme/ImmichLens.xcscheme")
}

/// SHA-256 of a file's bytes, hex encoded
pub fn sha256_file(path: &Path) -> String {
    let bytes = fs::read(path).expect("read file for hashing");
    hex::encode(Sha256::digest(&bytes))
}

/// Credential lookup with all three values present
pub fn full_env(key: &str) -> Option<String> {
    match key {
        "IMMICH_TEST_SERVER_URL" => Some("http://localhost:2283".to_string()),
        "IMMICH_TEST_EMAIL" => Some("demo@immich.app".to_string()),
        "IMMICH_TEST_PASSWORD" => Some("demo".to_string()),
        _ => None,
    }
}

/// Scratch project root containing `ImmichLens.xcodeproj` and its shared scheme
pub struct TestProject {
    dir: TempDir,
    pub scheme_path: PathBuf,
}

impl TestProject {
    /// Project with the sample scheme
    pub fn new() -> Self {
        let scheme = fs::read_to_string(scheme_fixture_path()).expect("read scheme fixture");
        Self::with_scheme(&scheme)
    }

    /// Project with a custom scheme document
    pub fn with_scheme(contents: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let schemes = dir
            .path()
            .join("ImmichLens.xcodeproj")
            .join("xcshareddata")
            .join("xcschemes");
        fs::create_dir_all(&schemes).expect("create scheme dir");

        let scheme_path = schemes.join("ImmichLens.xcscheme");
        fs::write(&scheme_path, contents).expect("write scheme");

        Self { dir, scheme_path }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn scheme_hash(&self) -> String {
        sha256_file(&self.scheme_path)
    }

    pub fn scheme_contents(&self) -> String {
        fs::read_to_string(&self.scheme_path).expect("read scheme")
    }
}

/// Default config with no boot settle delay
pub fn test_config() -> LaneConfig {
    let mut config = LaneConfig::default();
    config.device.boot_settle_seconds = 0;
    config
}

pub fn device(name: &str, udid: &str, available: bool, state: PowerState) -> DeviceDescriptor {
    DeviceDescriptor {
        name: name.to_string(),
        udid: udid.to_string(),
        runtime: "com.apple.CoreSimulator.SimRuntime.tvOS-18-2".to_string(),
        is_available: available,
        state,
    }
}

/// Simulator service backed by a fixed device list
pub struct FakeDevices {
    pub devices: Vec<DeviceDescriptor>,
    pub boots: RefCell<Vec<String>>,
    pub list_calls: RefCell<Vec<bool>>,
}

impl FakeDevices {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            boots: RefCell::new(Vec::new()),
            list_calls: RefCell::new(Vec::new()),
        }
    }

    /// The configured simulator, already booted
    pub fn booted() -> Self {
        Self::new(vec![device(SIMULATOR, UDID, true, PowerState::Booted)])
    }
}

impl DeviceControl for FakeDevices {
    fn list_devices(&self, available_only: bool) -> XcrunResult<Vec<DeviceDescriptor>> {
        self.list_calls.borrow_mut().push(available_only);
        Ok(self
            .devices
            .iter()
            .filter(|d| !available_only || d.is_available)
            .cloned()
            .collect())
    }

    fn boot(&self, udid: &str) -> XcrunResult<()> {
        self.boots.borrow_mut().push(udid.to_string());
        Ok(())
    }
}

/// Test runner that creates the result bundle and reports a fixed outcome
pub struct FakeRunner {
    pub exit_code: Option<i32>,
    pub output: String,
    pub hook: Option<Box<dyn Fn(&TestInvocation)>>,
    pub invocations: RefCell<Vec<TestInvocation>>,
}

impl FakeRunner {
    pub fn passing() -> Self {
        Self {
            exit_code: Some(0),
            output: "** TEST SUCCEEDED **\n".to_string(),
            hook: None,
            invocations: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(exit_code: i32, output: &str) -> Self {
        Self {
            exit_code: Some(exit_code),
            output: output.to_string(),
            hook: None,
            invocations: RefCell::new(Vec::new()),
        }
    }

    /// Call `hook` while the tests are "running"
    pub fn with_hook(mut self, hook: impl Fn(&TestInvocation) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn run_count(&self) -> usize {
        self.invocations.borrow().len()
    }
}

impl TestRunner for FakeRunner {
    fn run_test(&self, invocation: &TestInvocation, _work_dir: &Path) -> XcrunResult<TestOutput> {
        self.invocations.borrow_mut().push(invocation.clone());
        fs::create_dir_all(&invocation.result_bundle).map_err(|source| XcrunError::Spawn {
            tool: "xcodebuild".to_string(),
            source,
        })?;
        fs::write(invocation.result_bundle.join("Info.plist"), b"<plist/>").map_err(
            |source| XcrunError::Spawn {
                tool: "xcodebuild".to_string(),
                source,
            },
        )?;

        if let Some(ref hook) = self.hook {
            hook(invocation);
        }

        Ok(TestOutput {
            exit_code: self.exit_code,
            combined_output: self.output.clone(),
        })
    }
}

/// One attachment the fake exporter writes
#[derive(Debug, Clone)]
pub struct FakeAttachment {
    pub exported_file_name: String,
    pub suggested_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl FakeAttachment {
    pub fn new(exported: &str, suggested: Option<&str>) -> Self {
        Self {
            exported_file_name: exported.to_string(),
            suggested_name: suggested.map(str::to_string),
            bytes: format!("\u{89}PNG {}", exported).into_bytes(),
        }
    }
}

/// Attachment exporter that writes fixed files and a manifest
pub struct FakeExporter {
    pub attachments: Vec<FakeAttachment>,
    pub write_manifest: bool,
    pub exports: RefCell<Vec<PathBuf>>,
}

impl FakeExporter {
    pub fn new(attachments: Vec<FakeAttachment>) -> Self {
        Self {
            attachments,
            write_manifest: true,
            exports: RefCell::new(Vec::new()),
        }
    }

    /// Two screenshots named the way XCTest names them
    pub fn screenshots() -> Self {
        Self::new(vec![
            FakeAttachment::new(
                "Photos_0_5D0F2B7E-91C4-4E0A-B3F6-1A2B3C4D5E6F.png",
                Some("01_Photos_0_5D0F2B7E-91C4-4E0A-B3F6-1A2B3C4D5E6F.png"),
            ),
            FakeAttachment::new(
                "Albums_1_8E1A3C9F-2B4D-4F6A-8C0E-7D6C5B4A3F21.png",
                Some("02_Albums_1_8E1A3C9F-2B4D-4F6A-8C0E-7D6C5B4A3F21.png"),
            ),
        ])
    }

    /// Export succeeds but no manifest is produced
    pub fn without_manifest() -> Self {
        Self {
            write_manifest: false,
            ..Self::new(Vec::new())
        }
    }
}

impl AttachmentExporter for FakeExporter {
    fn export_attachments(
        &self,
        result_bundle: &Path,
        output_dir: &Path,
        _attachment_type: &str,
    ) -> XcrunResult<()> {
        self.exports.borrow_mut().push(output_dir.to_path_buf());
        assert!(result_bundle.exists(), "result bundle missing at export time");

        let io_err = |source| XcrunError::Spawn {
            tool: "xcresulttool".to_string(),
            source,
        };

        for attachment in &self.attachments {
            fs::write(output_dir.join(&attachment.exported_file_name), &attachment.bytes)
                .map_err(io_err)?;
        }

        if self.write_manifest {
            let attachments: Vec<serde_json::Value> = self
                .attachments
                .iter()
                .map(|a| match a.suggested_name {
                    Some(ref name) => serde_json::json!({
                        "exportedFileName": a.exported_file_name,
                        "suggestedHumanReadableName": name,
                        "isAssociatedWithFailure": false,
                    }),
                    None => serde_json::json!({
                        "exportedFileName": a.exported_file_name,
                        "isAssociatedWithFailure": false,
                    }),
                })
                .collect();
            let manifest = serde_json::json!([{
                "testIdentifier": TEST_IDENTIFIER,
                "attachments": attachments,
            }]);
            let bytes = serde_json::to_vec_pretty(&manifest).map_err(|e| XcrunError::ParseError {
                tool: "xcresulttool".to_string(),
                message: e.to_string(),
            })?;
            fs::write(output_dir.join(MANIFEST_FILE), bytes).map_err(io_err)?;
        }

        Ok(())
    }
}
