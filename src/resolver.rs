//! Logical device path → bus id resolution.
//!
//! Live detection wins whenever the node exists, since re-enumeration can
//! move a camera to a different port. The cache is consulted only once the
//! node is gone, because then there is nothing left to query.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::IdentityCache;
use crate::device::{BusId, BusIdQuery, DeviceProbe};
use crate::error::WatchdogError;

/// Where a Camera Map entry's bus id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Detected from the live device node.
    Live,
    /// Taken from the cache because the node was missing.
    Cache,
}

/// Why a device could not be resolved.
#[derive(Debug)]
pub enum UnresolvedReason {
    /// The node exists but no bus id could be derived from it.
    DetectionFailed(WatchdogError),
    /// The node is missing and nothing is cached for it.
    MissingUncached,
}

/// Outcome of resolving one logical device path.
#[derive(Debug)]
pub enum Resolution {
    Live { bus_id: BusId, cache_updated: bool },
    Cached { bus_id: BusId },
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub const fn bus_id(&self) -> Option<&BusId> {
        match self {
            Self::Live { bus_id, .. } | Self::Cached { bus_id } => Some(bus_id),
            Self::Unresolved(_) => None,
        }
    }

    pub const fn cache_updated(&self) -> bool {
        matches!(
            self,
            Self::Live {
                cache_updated: true,
                ..
            }
        )
    }
}

/// One resolved camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraEntry {
    pub device: String,
    pub bus_id: BusId,
    pub source: Source,
}

/// The session's resolved cameras, in configuration order.
///
/// Built once at startup and never changed while monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CameraMap {
    entries: Vec<CameraEntry>,
}

impl CameraMap {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, device: &str) -> Option<&BusId> {
        self.entries
            .iter()
            .find(|e| e.device == device)
            .map(|e| &e.bus_id)
    }

    pub fn entries(&self) -> &[CameraEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn devices(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.device.as_str()).collect()
    }

    fn push(&mut self, device: &str, bus_id: BusId, source: Source) {
        // A path listed twice in the configuration is monitored once.
        if self.get(device).is_none() {
            self.entries.push(CameraEntry {
                device: device.to_string(),
                bus_id,
                source,
            });
        }
    }
}

/// Resolves device paths against the OS and the identity cache.
#[derive(Debug, Clone)]
pub struct Resolver<P, Q> {
    probe: P,
    query: Q,
}

impl<P: DeviceProbe, Q: BusIdQuery> Resolver<P, Q> {
    pub const fn new(probe: P, query: Q) -> Self {
        Self { probe, query }
    }

    pub const fn probe(&self) -> &P {
        &self.probe
    }

    /// Resolve one device. Never mutates the cache; a `Live` result with
    /// `cache_updated` tells the caller to store the new id.
    #[instrument(skip(self, cache))]
    pub fn resolve(&self, device: &str, cache: &IdentityCache) -> Resolution {
        if self.probe.exists(device) {
            match self.query.bus_id(device) {
                Ok(bus_id) => {
                    let cache_updated = cache.get(device) != Some(&bus_id);
                    Resolution::Live {
                        bus_id,
                        cache_updated,
                    }
                }
                Err(err) => {
                    warn!(device, error = %err, "Could not detect bus ID");
                    Resolution::Unresolved(UnresolvedReason::DetectionFailed(err))
                }
            }
        } else if let Some(bus_id) = cache.get(device) {
            Resolution::Cached {
                bus_id: bus_id.clone(),
            }
        } else {
            warn!(device, "Device does not exist and no cached bus ID available");
            Resolution::Unresolved(UnresolvedReason::MissingUncached)
        }
    }

    /// Resolve every configured device and persist any cache changes.
    ///
    /// Each device is attempted exactly once. A failed cache save is logged
    /// and leaves the cache dirty for the next save.
    pub fn build_camera_map(&self, devices: &[String], cache: &mut IdentityCache) -> CameraMap {
        let mut map = CameraMap::default();

        for device in devices {
            match self.resolve(device, cache) {
                Resolution::Live {
                    bus_id,
                    cache_updated,
                } => {
                    info!(device = %device, %bus_id, "Detected camera");
                    if cache_updated {
                        cache.insert(device, bus_id.clone());
                    }
                    map.push(device, bus_id, Source::Live);
                }
                Resolution::Cached { bus_id } => {
                    info!(device = %device, %bus_id, "Using cached bus ID, device missing");
                    map.push(device, bus_id, Source::Cache);
                }
                Resolution::Unresolved(_) => {}
            }
        }

        if cache.is_dirty() {
            if let Err(err) = cache.save() {
                warn!(error = %err, "Cache not persisted; will retry on next update");
            }
        }

        map
    }
}
