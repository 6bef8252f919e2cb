//! Driver unbind/bind cycle for a vanished camera.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::device::{BusId, DriverControl, Sleeper};
use crate::error::Result;

/// Delays around the unbind/bind cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebindTiming {
    /// Wait after `unbind` before `bind`.
    pub unbind_settle: Duration,
    /// Wait after `bind` for the kernel to re-enumerate the node.
    pub bind_settle: Duration,
}

impl Default for RebindTiming {
    fn default() -> Self {
        Self {
            unbind_settle: Duration::from_secs(2),
            bind_settle: Duration::from_secs(3),
        }
    }
}

/// Forces re-enumeration of a USB camera through its driver.
#[derive(Debug, Clone)]
pub struct Rebinder<D, S> {
    driver: D,
    sleeper: S,
    timing: RebindTiming,
}

impl<D: DriverControl, S: Sleeper> Rebinder<D, S> {
    pub const fn new(driver: D, sleeper: S, timing: RebindTiming) -> Self {
        Self {
            driver,
            sleeper,
            timing,
        }
    }

    pub const fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Unbind, settle, bind, settle.
    ///
    /// The unbind result is ignored: after a USB glitch the interface is
    /// often already detached. Only a failed bind is reported.
    pub fn rebind(&self, bus_id: &BusId) -> Result<()> {
        info!(%bus_id, "Rebinding");

        if let Err(err) = self.driver.unbind(bus_id) {
            debug!(%bus_id, error = %err, "Unbind failed, continuing with bind");
        }
        self.sleeper.sleep(self.timing.unbind_settle);

        let bound = self.driver.bind(bus_id);
        self.sleeper.sleep(self.timing.bind_settle);

        match bound {
            Ok(()) => {
                info!(%bus_id, "Done rebinding");
                Ok(())
            }
            Err(err) => {
                error!(%bus_id, error = %err, "Rebind failed");
                Err(err)
            }
        }
    }
}
