//! Mock host for unit testing.
//!
//! [`MockHost`] stands in for the filesystem, udev, the driver's sysfs files
//! and the clock at once. Clones share state, so a test keeps one handle for
//! assertions while the watchdog owns the others.
//!
//! # Example
//!
//! ```rust,ignore
//! use camwd::device::mock::{MockHost, Operation};
//!
//! let host = MockHost::new()
//!     .with_device("/dev/video0", "1-2:1.0")
//!     .with_missing("/dev/video1");
//!
//! // ... run the resolver or watchdog against host.clone() ...
//!
//! host.assert_operations(&[Operation::Query { device: "/dev/video0".into() }]);
//! ```

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, trace};

use super::{BusId, BusIdQuery, DeviceProbe, DriverControl, Sleeper};
use crate::error::{Result, WatchdogError};

/// Recorded operation for assertions.
///
/// Existence probes are not recorded; they happen on every poll and would
/// drown out the interesting calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Query { device: String },
    Unbind { bus_id: String },
    Bind { bus_id: String },
    Sleep { millis: u64 },
}

#[derive(Debug, Default)]
struct HostState {
    present: HashSet<String>,
    symlinks: HashMap<String, PathBuf>,
    /// Query answers: `Some(sysfs path)` or `None` for a failing query.
    udev_paths: HashMap<String, Option<String>>,
    failing_binds: HashSet<String>,
    failing_unbinds: HashSet<String>,
    /// Device paths that reappear when their bus id is bound.
    reappear_on_bind: HashMap<String, String>,
    operation_log: Vec<Operation>,
}

/// Mock OS for resolver, recovery and watchdog tests.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().expect("mock host lock poisoned")
    }

    /// A present device whose udev path contains `bus_id`.
    #[must_use]
    pub fn with_device(self, path: &str, bus_id: &str) -> Self {
        {
            let mut state = self.state();
            state.present.insert(path.to_string());
            state.udev_paths.insert(
                path.to_string(),
                Some(format!("/devices/platform/usb1/{bus_id}/video4linux/video0")),
            );
        }
        self
    }

    /// A present device whose udev path has no USB segment.
    #[must_use]
    pub fn with_non_usb_device(self, path: &str) -> Self {
        {
            let mut state = self.state();
            state.present.insert(path.to_string());
            state.udev_paths.insert(
                path.to_string(),
                Some("/devices/virtual/video4linux/video0".to_string()),
            );
        }
        self
    }

    /// A present device for which the udev query itself fails.
    #[must_use]
    pub fn with_failing_query(self, path: &str) -> Self {
        {
            let mut state = self.state();
            state.present.insert(path.to_string());
            state.udev_paths.insert(path.to_string(), None);
        }
        self
    }

    /// A device that is currently absent.
    #[must_use]
    pub fn with_missing(self, path: &str) -> Self {
        self.state().present.remove(path);
        self
    }

    /// Report `path` as a symlink to `target`.
    #[must_use]
    pub fn with_symlink(self, path: &str, target: &str) -> Self {
        self.state()
            .symlinks
            .insert(path.to_string(), PathBuf::from(target));
        self
    }

    /// Make `bind` fail for `bus_id`.
    #[must_use]
    pub fn with_failing_bind(self, bus_id: &str) -> Self {
        self.state().failing_binds.insert(bus_id.to_string());
        self
    }

    /// Make `unbind` fail for `bus_id`.
    #[must_use]
    pub fn with_failing_unbind(self, bus_id: &str) -> Self {
        self.state().failing_unbinds.insert(bus_id.to_string());
        self
    }

    /// Bring `path` back once `bus_id` is successfully bound.
    #[must_use]
    pub fn reappear_on_bind(self, bus_id: &str, path: &str) -> Self {
        self.state()
            .reappear_on_bind
            .insert(bus_id.to_string(), path.to_string());
        self
    }

    /// Change presence of a device mid-test.
    pub fn set_present(&self, path: &str, present: bool) {
        let mut state = self.state();
        if present {
            state.present.insert(path.to_string());
        } else {
            state.present.remove(path);
        }
    }

    /// All operations recorded so far.
    pub fn operations(&self) -> Vec<Operation> {
        self.state().operation_log.clone()
    }

    /// Operations excluding sleeps.
    pub fn driver_and_query_operations(&self) -> Vec<Operation> {
        self.operations()
            .into_iter()
            .filter(|op| !matches!(op, Operation::Sleep { .. }))
            .collect()
    }

    /// Bus ids that received a `bind`, in order.
    pub fn bound(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                Operation::Bind { bus_id } => Some(bus_id),
                _ => None,
            })
            .collect()
    }

    pub fn clear_operations(&self) {
        self.state().operation_log.clear();
    }

    /// Assert the exact non-sleep operation sequence.
    ///
    /// # Panics
    ///
    /// Panics if the recorded sequence differs.
    pub fn assert_operations(&self, expected: &[Operation]) {
        let actual = self.driver_and_query_operations();
        assert_eq!(actual, expected, "operation log mismatch");
    }

    fn record(&self, op: Operation) {
        trace!(?op, "Mock operation");
        self.state().operation_log.push(op);
    }
}

impl DeviceProbe for MockHost {
    fn exists(&self, path: &str) -> bool {
        self.state().present.contains(path)
    }

    fn symlink_target(&self, path: &str) -> Option<PathBuf> {
        self.state().symlinks.get(path).cloned()
    }
}

impl BusIdQuery for MockHost {
    fn bus_id(&self, device: &str) -> Result<BusId> {
        self.record(Operation::Query {
            device: device.to_string(),
        });

        let answer = self.state().udev_paths.get(device).cloned();
        match answer {
            Some(Some(path)) => BusId::extract(&path).ok_or(WatchdogError::BusIdNotFound { path }),
            Some(None) | None => Err(WatchdogError::QueryFailed {
                device: device.to_string(),
                reason: "mock query failure".to_string(),
            }),
        }
    }
}

impl DriverControl for MockHost {
    fn unbind(&self, bus_id: &BusId) -> Result<()> {
        self.record(Operation::Unbind {
            bus_id: bus_id.to_string(),
        });

        if self.state().failing_unbinds.contains(bus_id.as_str()) {
            return Err(WatchdogError::DriverControl {
                action: "unbind",
                bus_id: bus_id.to_string(),
                reason: "No such device".to_string(),
            });
        }
        Ok(())
    }

    fn bind(&self, bus_id: &BusId) -> Result<()> {
        self.record(Operation::Bind {
            bus_id: bus_id.to_string(),
        });

        let mut state = self.state();
        if state.failing_binds.contains(bus_id.as_str()) {
            return Err(WatchdogError::DriverControl {
                action: "bind",
                bus_id: bus_id.to_string(),
                reason: "Permission denied".to_string(),
            });
        }
        if let Some(path) = state.reappear_on_bind.get(bus_id.as_str()).cloned() {
            debug!(%bus_id, path, "Mock device re-enumerated");
            state.present.insert(path);
        }
        Ok(())
    }
}

impl Sleeper for MockHost {
    fn sleep(&self, duration: Duration) {
        self.record(Operation::Sleep {
            millis: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        });
    }
}
