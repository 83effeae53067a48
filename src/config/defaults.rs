//! Built-in defaults: the constants of the ImmichLens screenshot deployment.

pub const PROJECT: &str = "ImmichLens.xcodeproj";
pub const SCHEME: &str = "ImmichLens";
pub const TEST_PLAN: &str = "ImmichLensScreenshots.xctestplan";
pub const RESULT_BUNDLE: &str = "screenshots.xcresult";
pub const OUTPUT_DIR: &str = "screenshots";

pub const TEST_TARGET_NAME: &str = "ImmichLensUITests";
pub const TEST_TARGET_IDENTIFIER: &str = "7B913997CEB430EA198332F7";

/// Configuration id written into the generated test plan.
/// Fixed so identical credentials produce identical plan bytes.
pub const PLAN_CONFIGURATION_ID: &str = "9A3C1B2D-E4F5-6789-ABCD-EF0123456789";
pub const PLAN_CONFIGURATION_NAME: &str = "Configuration 1";

pub const SIMULATOR_NAME: &str = "Apple TV 4K (3rd generation) (at 1080p)";
pub const PLATFORM: &str = "tvOS Simulator";
pub const CANDIDATE_HINT: &str = "tv";
pub const BOOT_SETTLE_SECONDS: u64 = 5;

pub const ATTACHMENT_TYPE: &str = "png";
pub const TAIL_LINES: usize = 30;
pub const EXTRA_TEST_FLAGS: &[&str] = &["-skipPackagePluginValidation"];

/// Repo config file looked up when `--config` is not given
pub const CONFIG_FILE: &str = ".xcshots.toml";
