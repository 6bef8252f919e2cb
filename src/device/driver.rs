//! Kernel driver bind/unbind through sysfs.
//!
//! Writing a bus id to `/sys/bus/usb/drivers/<driver>/unbind` detaches the
//! driver from that interface; writing it to `bind` reattaches it, which
//! makes the kernel re-enumerate the video node.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};

use tracing::{debug, trace};

use super::{BusId, DriverControl};
use crate::error::{Result, WatchdogError};

fn driver_dir(sysfs_root: &Path, driver: &str) -> PathBuf {
    sysfs_root.join("bus/usb/drivers").join(driver)
}

/// Writes bus ids straight into the driver's sysfs control files.
///
/// Needs root (or write access granted to the service user by a udev rule).
#[derive(Debug, Clone)]
pub struct SysfsDriver {
    dir: PathBuf,
}

impl SysfsDriver {
    pub fn new(sysfs_root: impl AsRef<Path>, driver: &str) -> Self {
        Self {
            dir: driver_dir(sysfs_root.as_ref(), driver),
        }
    }

    /// Directory holding the `bind` and `unbind` files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, action: &'static str, bus_id: &BusId) -> Result<()> {
        let file = self.dir.join(action);
        trace!(file = %file.display(), %bus_id, "Writing driver control file");

        OpenOptions::new()
            .write(true)
            .open(&file)
            .and_then(|mut f| f.write_all(bus_id.as_str().as_bytes()))
            .map_err(|e| WatchdogError::DriverControl {
                action,
                bus_id: bus_id.to_string(),
                reason: format!("{}: {e}", file.display()),
            })
    }
}

impl DriverControl for SysfsDriver {
    fn unbind(&self, bus_id: &BusId) -> Result<()> {
        self.write("unbind", bus_id)
    }

    fn bind(&self, bus_id: &BusId) -> Result<()> {
        self.write("bind", bus_id)
    }
}

/// Pipes bus ids into `sudo -n tee <file>` for services running as an
/// unprivileged user with a sudoers rule for `tee`.
#[derive(Debug, Clone)]
pub struct SudoTeeDriver {
    dir: PathBuf,
    sudo: PathBuf,
}

impl SudoTeeDriver {
    pub fn new(sysfs_root: impl AsRef<Path>, driver: &str) -> Self {
        Self {
            dir: driver_dir(sysfs_root.as_ref(), driver),
            sudo: PathBuf::from("sudo"),
        }
    }

    /// Use a different escalation helper (e.g. `doas`).
    pub fn with_helper(mut self, helper: impl Into<PathBuf>) -> Self {
        self.sudo = helper.into();
        self
    }

    fn tee(&self, action: &'static str, bus_id: &BusId) -> Result<()> {
        let file = self.dir.join(action);
        let fail = |reason: String| WatchdogError::DriverControl {
            action,
            bus_id: bus_id.to_string(),
            reason,
        };

        debug!(helper = %self.sudo.display(), file = %file.display(), %bus_id, "Running privileged tee");

        let child = Command::new(&self.sudo)
            .arg("-n")
            .arg("tee")
            .arg(&file)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| fail(format!("could not run {}: {e}", self.sudo.display())))?;

        let (output, written) =
            write_and_wait(child, bus_id.as_str().as_bytes()).map_err(|e| fail(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!("{} ({})", output.status, stderr.trim())));
        }
        written.map_err(|e| fail(format!("writing to {}: {e}", self.sudo.display())))
    }
}

/// Feed `input` to the child's stdin, close it and wait for the child.
///
/// The child is reaped even when the write fails; the write result is
/// returned next to its output.
fn write_and_wait(mut child: Child, input: &[u8]) -> io::Result<(Output, io::Result<()>)> {
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(input),
        None => Ok(()),
    };
    let output = child.wait_with_output()?;
    Ok((output, written))
}

impl DriverControl for SudoTeeDriver {
    fn unbind(&self, bus_id: &BusId) -> Result<()> {
        self.tee("unbind", bus_id)
    }

    fn bind(&self, bus_id: &BusId) -> Result<()> {
        self.tee("bind", bus_id)
    }
}
