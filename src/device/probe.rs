//! Filesystem existence checks for camera device nodes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::DeviceProbe;

/// Check that a device node exists and is accessible.
///
/// Symlinks (udev `by-id`/`by-path` names) must resolve to an existing
/// target. The final `stat` catches nodes that vanish between checks.
pub fn device_exists(path: &Path) -> bool {
    if !path.exists() {
        trace!(path = %path.display(), "Device path does not exist");
        return false;
    }

    let is_symlink = fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
    if is_symlink {
        match fs::canonicalize(path) {
            Ok(target) if target.exists() => {}
            _ => {
                trace!(path = %path.display(), "Symlink target missing");
                return false;
            }
        }
    }

    fs::metadata(path).is_ok()
}

/// [`DeviceProbe`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl DeviceProbe for FsProbe {
    fn exists(&self, path: &str) -> bool {
        device_exists(Path::new(path))
    }

    fn symlink_target(&self, path: &str) -> Option<PathBuf> {
        let path = Path::new(path);
        let meta = fs::symlink_metadata(path).ok()?;
        if meta.file_type().is_symlink() {
            fs::canonicalize(path).ok()
        } else {
            None
        }
    }
}
