//! Persistent device-path → bus-id cache.
//!
//! Once `/dev/videoN` disappears udev can no longer tell us which USB
//! interface it belonged to, so the last bus id seen for each path is kept
//! on disk. Entries are never expired; a stale entry is exactly what lets a
//! vanished camera be rebound after a restart.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::device::BusId;
use crate::error::{Result, WatchdogError};

/// JSON-file backed identity cache.
#[derive(Debug, Clone)]
pub struct IdentityCache {
    path: PathBuf,
    entries: BTreeMap<String, BusId>,
    dirty: bool,
}

impl IdentityCache {
    /// Empty cache that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the cache, degrading to an empty one if the file is missing or
    /// unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(cache) => cache,
            Err(err) => {
                warn!(error = %err, "Starting with an empty cache");
                Self::new(path)
            }
        }
    }

    /// Load the cache, reporting read and parse failures.
    ///
    /// A missing file is not an error. Entries whose value is not a valid
    /// bus id are dropped with a warning rather than failing the whole load.
    pub fn try_load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache file yet");
                return Ok(Self::new(path));
            }
            Err(e) => {
                return Err(WatchdogError::CacheRead {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| WatchdogError::CacheRead {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut entries = BTreeMap::new();
        for (device, value) in raw {
            let Some(text) = value.as_str() else {
                warn!(device, %value, "Ignoring cache entry that is not a string");
                continue;
            };
            match BusId::parse(text) {
                Ok(bus_id) => {
                    entries.insert(device, bus_id);
                }
                Err(err) => warn!(device, error = %err, "Ignoring cache entry"),
            }
        }

        debug!(path = %path.display(), entries = entries.len(), "Loaded cache");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    /// Overwrite the cache file with the full mapping.
    ///
    /// The dirty flag is cleared only on success, so a failed save is
    /// retried by the next one.
    pub fn save(&mut self) -> Result<()> {
        let fail = |reason: String| WatchdogError::CacheWrite {
            path: self.path.display().to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| fail(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| fail(e.to_string()))?;

        info!(path = %self.path.display(), entries = self.entries.len(), "Saved cache");
        self.dirty = false;
        Ok(())
    }

    pub fn get(&self, device: &str) -> Option<&BusId> {
        self.entries.get(device)
    }

    /// Record `bus_id` for `device`. Returns true if the stored value changed.
    pub fn insert(&mut self, device: &str, bus_id: BusId) -> bool {
        if self.entries.get(device) == Some(&bus_id) {
            return false;
        }
        self.entries.insert(device.to_string(), bus_id);
        self.dirty = true;
        true
    }

    /// True if there are changes not yet written to disk.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BusId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
