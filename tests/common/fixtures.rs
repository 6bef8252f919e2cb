//! Temporary host layouts for tests.
//!
//! A [`TestHost`] is a scratch directory holding everything a watchdog run
//! touches: device nodes, the teleop INI, the bus id cache, a sysfs driver
//! directory and a fake `udevadm`. It is removed when dropped.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const DRIVER: &str = "uvcvideo";

/// Sysfs path udev reports for a camera on `bus_id`.
#[must_use]
pub fn sysfs_path(bus_id: &str) -> String {
    let port = bus_id.split(':').next().unwrap_or(bus_id);
    format!("/devices/platform/xhci-hcd.0/usb1/{port}/{bus_id}/video4linux/video0")
}

pub struct TestHost {
    pub dir: TempDir,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(dir.path().join("dev")).expect("Failed to create dev dir");
        Self { dir }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path a device node named `name` would have, without creating it.
    #[must_use]
    pub fn device(&self, name: &str) -> String {
        self.path().join("dev").join(name).display().to_string()
    }

    /// Create the device node `name` and return its path.
    #[must_use]
    pub fn create_device(&self, name: &str) -> String {
        let path = self.device(name);
        fs::write(&path, b"").expect("Failed to create device node");
        path
    }

    pub fn remove_device(&self, name: &str) {
        fs::remove_file(self.device(name)).expect("Failed to remove device node");
    }

    /// Write a teleop INI with one camera pipeline per device.
    pub fn write_teleop(&self, devices: &[&str]) -> PathBuf {
        let mut text = String::from("[general]\nrobot = test\n\n[plugin]\n");
        for (i, device) in devices.iter().enumerate() {
            text.push_str(&format!(
                "camera{} = v4l2src device={device} ! video/x-raw,width=640,height=480 ! fakesink\n",
                i + 1
            ));
        }
        self.write_file("teleop.ini", &text)
    }

    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.path().join("cache.json")
    }

    /// Seed the bus id cache.
    pub fn write_cache(&self, entries: &[(&str, &str)]) -> PathBuf {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(device, bus_id)| ((*device).to_string(), (*bus_id).into()))
            .collect();
        let text = serde_json::to_string_pretty(&map).expect("Failed to encode cache");
        self.write_file("cache.json", &text)
    }

    /// Parsed contents of the cache file.
    #[must_use]
    pub fn read_cache(&self) -> serde_json::Value {
        let text = fs::read_to_string(self.cache_path()).expect("Failed to read cache");
        serde_json::from_str(&text).expect("Cache is not valid JSON")
    }

    /// Root of a fake sysfs with writable `bind`/`unbind` files.
    #[must_use]
    pub fn sysfs_root(&self) -> PathBuf {
        let root = self.path().join("sys");
        let driver = root.join("bus/usb/drivers").join(DRIVER);
        fs::create_dir_all(&driver).expect("Failed to create driver dir");
        for file in ["bind", "unbind"] {
            let path = driver.join(file);
            if !path.exists() {
                fs::write(&path, b"").expect("Failed to create driver file");
            }
        }
        root
    }

    /// Contents written to the driver's `bind` or `unbind` file.
    #[must_use]
    pub fn driver_file(&self, action: &str) -> String {
        fs::read_to_string(self.sysfs_root().join("bus/usb/drivers").join(DRIVER).join(action))
            .expect("Failed to read driver file")
    }

    /// A `udevadm` stand-in answering `info -q path -n <device>` for the
    /// given devices and failing for anything else.
    #[cfg(unix)]
    #[must_use]
    pub fn fake_udevadm(&self, answers: &[(&str, &str)]) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let mut script = String::from("#!/bin/sh\ncase \"$5\" in\n");
        for (device, bus_id) in answers {
            script.push_str(&format!("  '{device}') echo '{}' ;;\n", sysfs_path(bus_id)));
        }
        script.push_str("  *) echo \"Unknown device $5\" >&2; exit 4 ;;\nesac\n");

        let path = self.write_file("udevadm", &script);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make udevadm executable");
        path
    }

    /// Settings TOML pointing every path into this host, with zero delays
    /// and file logging off.
    pub fn write_settings(&self, udevadm: &Path) -> PathBuf {
        let text = format!(
            "teleop_config = \"teleop.ini\"\n\
             cache_file = \"cache.json\"\n\
             log_file = \"camwd.log\"\n\
             log_to_file = false\n\
             poll_interval_secs = 0.0\n\
             unbind_settle_secs = 0.0\n\
             bind_settle_secs = 0.0\n\
             driver = \"{DRIVER}\"\n\
             sysfs_root = \"{}\"\n\
             udevadm = \"{}\"\n",
            self.sysfs_root().display(),
            udevadm.display()
        );
        self.write_file("settings.toml", &text)
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).expect("Failed to write fixture");
        path
    }
}
