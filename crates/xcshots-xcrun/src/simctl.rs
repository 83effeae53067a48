//! Simulator queries and boot via `xcrun simctl`.
//!
//! `simctl list devices -j` groups devices by runtime identifier. The
//! grouping order reported by simctl is kept, since device selection scans
//! runtimes in that order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;

use crate::{command_failed, XcrunError, XcrunResult};

/// Power state of a simulator as reported by simctl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerState {
    Booted,
    Shutdown,
    Other(String),
}

impl From<String> for PowerState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Booted" => PowerState::Booted,
            "Shutdown" => PowerState::Shutdown,
            _ => PowerState::Other(value),
        }
    }
}

impl From<PowerState> for String {
    fn from(state: PowerState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Booted => f.write_str("Booted"),
            PowerState::Shutdown => f.write_str("Shutdown"),
            PowerState::Other(s) => f.write_str(s),
        }
    }
}

/// One simulator, flattened out of its runtime group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    /// Display name (e.g., "Apple TV 4K (3rd generation) (at 1080p)")
    pub name: String,

    /// Device UDID
    pub udid: String,

    /// Runtime identifier the device belongs to
    pub runtime: String,

    /// Whether simctl considers the device usable
    pub is_available: bool,

    /// Current power state
    pub state: PowerState,
}

impl DeviceDescriptor {
    pub fn is_booted(&self) -> bool {
        self.state == PowerState::Booted
    }
}

#[derive(Debug, Deserialize)]
struct SimctlDevice {
    name: String,
    udid: String,
    #[serde(default = "unknown_state")]
    state: String,
    #[serde(rename = "isAvailable", default)]
    is_available: bool,
}

fn unknown_state() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Deserialize)]
struct SimctlDevices {
    devices: IndexMap<String, Vec<SimctlDevice>>,
}

/// Parse `simctl list devices -j` output into descriptors.
///
/// Descriptors are returned in runtime order, then in the order simctl
/// lists devices within each runtime.
pub fn parse_device_list(json: &[u8]) -> XcrunResult<Vec<DeviceDescriptor>> {
    let parsed: SimctlDevices = serde_json::from_slice(json).map_err(|e| XcrunError::ParseError {
        tool: "simctl list".to_string(),
        message: e.to_string(),
    })?;

    let mut descriptors = Vec::new();
    for (runtime, devices) in parsed.devices {
        for device in devices {
            descriptors.push(DeviceDescriptor {
                name: device.name,
                udid: device.udid,
                runtime: runtime.clone(),
                is_available: device.is_available,
                state: PowerState::from(device.state),
            });
        }
    }

    Ok(descriptors)
}

/// List simulators known to simctl.
///
/// With `available_only`, simctl filters out devices whose runtime is
/// missing or otherwise unusable.
pub fn list_devices(available_only: bool) -> XcrunResult<Vec<DeviceDescriptor>> {
    let mut args = vec!["simctl", "list", "devices"];
    if available_only {
        args.push("available");
    }
    args.push("-j");

    tracing::debug!(?args, "querying simulators");
    let output = Command::new("xcrun")
        .args(&args)
        .output()
        .map_err(|source| XcrunError::Spawn {
            tool: "simctl list".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(command_failed("simctl list", &output.stderr));
    }

    parse_device_list(&output.stdout)
}

/// Boot a simulator by UDID.
pub fn boot_device(udid: &str) -> XcrunResult<()> {
    tracing::debug!(udid, "booting simulator");
    let output = Command::new("xcrun")
        .args(["simctl", "boot", udid])
        .output()
        .map_err(|source| XcrunError::Spawn {
            tool: "simctl boot".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(command_failed("simctl boot", &output.stderr));
    }

    Ok(())
}
