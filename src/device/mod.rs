//! Device abstraction layer for USB cameras.
//!
//! The watchdog touches the OS in four places: probing a device node,
//! asking udev for a node's sysfs path, writing to the driver's bind/unbind
//! files, and sleeping between steps. Each is a trait here so the resolver,
//! recovery and loop logic run against [`mock`] implementations in tests.

mod driver;
mod info;
pub mod mock;
mod probe;
mod udev;

pub use driver::{SudoTeeDriver, SysfsDriver};
pub use info::BusId;
pub use probe::{FsProbe, device_exists};
pub use udev::UdevadmQuery;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Existence checks for logical device paths.
pub trait DeviceProbe {
    /// True if the node exists, its symlink target (if any) exists, and it
    /// can be stat'ed. Never fails; OS errors read as "missing".
    fn exists(&self, path: &str) -> bool;

    /// Canonical target when `path` is a symlink, `None` otherwise.
    fn symlink_target(&self, path: &str) -> Option<PathBuf>;
}

/// Maps an existing device node to its USB bus id.
pub trait BusIdQuery {
    /// Query the OS for the bus id of `device`.
    ///
    /// # Errors
    ///
    /// `QueryFailed` if the query tool cannot run or exits non-zero,
    /// `BusIdNotFound` if its output contains no USB topology token.
    fn bus_id(&self, device: &str) -> Result<BusId>;
}

/// Privileged driver bind/unbind actions.
///
/// Implemented by a direct sysfs write ([`SysfsDriver`]) and by a sudo
/// helper ([`SudoTeeDriver`]).
pub trait DriverControl {
    fn unbind(&self, bus_id: &BusId) -> Result<()>;

    fn bind(&self, bus_id: &BusId) -> Result<()>;
}

/// Blocking delay between recovery steps and poll cycles.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Driver control selected at runtime from settings.
pub type BoxedDriver = Box<dyn DriverControl>;

impl<T: DriverControl + ?Sized> DriverControl for Box<T> {
    fn unbind(&self, bus_id: &BusId) -> Result<()> {
        (**self).unbind(bus_id)
    }

    fn bind(&self, bus_id: &BusId) -> Result<()> {
        (**self).bind(bus_id)
    }
}
