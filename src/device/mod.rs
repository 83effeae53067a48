//! Device reconciliation
//!
//! Resolves the configured simulator name to a concrete, running device:
//! - Device state is queried fresh on every run
//! - First device (in simctl's runtime order) whose name matches exactly and
//!   which is available wins
//! - A shut-down match is booted, followed by a fixed settle delay
//!
//! The settle delay is a best-effort buffer, not a readiness check.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use xcshots_xcrun::{DeviceDescriptor, XcrunError};

use crate::config::DeviceConfig;
use crate::progress::Progress;
use crate::tools::DeviceControl;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// No available device with the configured name
    #[error("Simulator '{name}' not found")]
    NotFound {
        name: String,
        hint: String,
        candidates: Vec<DeviceDescriptor>,
    },

    #[error(transparent)]
    Tool(#[from] XcrunError),
}

/// First available device named exactly `name`
pub fn select_device<'a>(devices: &'a [DeviceDescriptor], name: &str) -> Option<&'a DeviceDescriptor> {
    devices.iter().find(|d| d.name == name && d.is_available)
}

/// Devices whose name contains `hint`, ignoring case
pub fn find_candidates(devices: &[DeviceDescriptor], hint: &str) -> Vec<DeviceDescriptor> {
    let hint = hint.to_lowercase();
    devices
        .iter()
        .filter(|d| d.name.to_lowercase().contains(&hint))
        .cloned()
        .collect()
}

/// Find the configured device and make sure it is booted
pub fn reconcile(
    control: &dyn DeviceControl,
    config: &DeviceConfig,
    progress: &Progress,
) -> Result<DeviceDescriptor, DeviceError> {
    let devices = control.list_devices(false)?;
    tracing::debug!(count = devices.len(), "simulators listed");

    let device = match select_device(&devices, &config.name) {
        Some(device) => device.clone(),
        None => {
            let candidates = match control.list_devices(true) {
                Ok(available) => find_candidates(&available, &config.candidate_hint),
                Err(e) => {
                    tracing::warn!(error = %e, "could not list candidate simulators");
                    Vec::new()
                }
            };
            return Err(DeviceError::NotFound {
                name: config.name.clone(),
                hint: config.candidate_hint.clone(),
                candidates,
            });
        }
    };

    if !device.is_booted() {
        progress.detail(format!("Booting simulator {}...", device.name));
        control.boot(&device.udid)?;
        tracing::debug!(
            udid = %device.udid,
            settle_seconds = config.boot_settle_seconds,
            "waiting for simulator to settle"
        );
        thread::sleep(Duration::from_secs(config.boot_settle_seconds));
    }

    progress.step(format!("Simulator ready ({})", device.udid));
    Ok(device)
}
