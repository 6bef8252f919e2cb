//! Bus id lookup through `udevadm`.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, trace};

use super::{BusId, BusIdQuery};
use crate::error::{Result, WatchdogError};

/// Runs `udevadm info -q path -n <device>` and extracts the bus id from the
/// sysfs path it prints.
#[derive(Debug, Clone)]
pub struct UdevadmQuery {
    program: PathBuf,
}

impl Default for UdevadmQuery {
    fn default() -> Self {
        Self::new("udevadm")
    }
}

impl UdevadmQuery {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Canonical sysfs path of `device` as reported by udev.
    pub fn device_path(&self, device: &str) -> Result<String> {
        trace!(program = %self.program.display(), device, "Querying udev");

        let output = Command::new(&self.program)
            .args(["info", "-q", "path", "-n", device])
            .output()
            .map_err(|e| WatchdogError::QueryFailed {
                device: device.to_string(),
                reason: format!("could not run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchdogError::QueryFailed {
                device: device.to_string(),
                reason: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(device, sysfs_path = %path, "udev reported device path");
        Ok(path)
    }
}

impl BusIdQuery for UdevadmQuery {
    fn bus_id(&self, device: &str) -> Result<BusId> {
        let path = self.device_path(device)?;
        BusId::extract(&path).ok_or(WatchdogError::BusIdNotFound { path })
    }
}
