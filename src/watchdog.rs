//! The monitoring loop.
//!
//! `Init` resolves the configured cameras into a [`CameraMap`]; `Monitoring`
//! then polls each node and rebinds any that are missing. The loop is
//! level-triggered: a camera that stays missing is rebound every cycle, and
//! one that comes back is simply left alone.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::cache::IdentityCache;
use crate::config::{Settings, read_camera_devices};
use crate::device::{
    BoxedDriver, BusIdQuery, DeviceProbe, DriverControl, FsProbe, Sleeper, SudoTeeDriver,
    SysfsDriver, ThreadSleeper, UdevadmQuery,
};
use crate::error::{Result, WatchdogError};
use crate::recovery::Rebinder;
use crate::resolver::{CameraMap, Resolver};

/// Lifecycle of a watchdog session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogState {
    Init,
    Monitoring,
}

/// What one poll cycle saw and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub cycle: u64,
    pub checked: usize,
    /// Devices found missing, in map order.
    pub missing: Vec<String>,
    pub rebinds_failed: usize,
}

/// Watchdog wired to the real OS.
pub type SystemWatchdog = Watchdog<FsProbe, UdevadmQuery, BoxedDriver, ThreadSleeper>;

/// Camera watchdog over pluggable probe, query, driver and clock.
pub struct Watchdog<P, Q, D, S> {
    resolver: Resolver<P, Q>,
    rebinder: Rebinder<D, S>,
    poll_interval: Duration,
    state: WatchdogState,
    map: CameraMap,
    cycles: u64,
}

impl<P, Q, D, S> Watchdog<P, Q, D, S>
where
    P: DeviceProbe,
    Q: BusIdQuery,
    D: DriverControl,
    S: Sleeper,
{
    pub const fn new(
        resolver: Resolver<P, Q>,
        rebinder: Rebinder<D, S>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            resolver,
            rebinder,
            poll_interval,
            state: WatchdogState::Init,
            map: CameraMap::new(),
            cycles: 0,
        }
    }

    pub const fn state(&self) -> WatchdogState {
        self.state
    }

    pub const fn camera_map(&self) -> &CameraMap {
        &self.map
    }

    pub const fn resolver(&self) -> &Resolver<P, Q> {
        &self.resolver
    }

    /// Resolve `devices` and enter `Monitoring`.
    ///
    /// # Errors
    ///
    /// `NoCamerasConfigured` for an empty device list and
    /// `NoCamerasResolved` when nothing could be mapped. Both are fatal; the
    /// poll loop must not start.
    pub fn init(&mut self, devices: &[String], cache: &mut IdentityCache) -> Result<&CameraMap> {
        if devices.is_empty() {
            error!("No cameras found in configuration");
            return Err(WatchdogError::NoCamerasConfigured);
        }

        let map = self.resolver.build_camera_map(devices, cache);
        if map.is_empty() {
            error!(configured = devices.len(), "No cameras could be mapped");
            return Err(WatchdogError::NoCamerasResolved);
        }

        info!(cameras = ?map.devices(), "Monitoring cameras");
        self.map = map;
        self.state = WatchdogState::Monitoring;
        Ok(&self.map)
    }

    /// Check every camera once, rebinding the missing ones.
    pub fn poll_once(&mut self) -> PollReport {
        self.cycles += 1;
        let mut report = PollReport {
            cycle: self.cycles,
            checked: self.map.len(),
            ..PollReport::default()
        };

        for entry in self.map.entries() {
            if self.resolver.probe().exists(&entry.device) {
                continue;
            }
            warn!(device = %entry.device, bus_id = %entry.bus_id, "Camera missing, rebinding");
            report.missing.push(entry.device.clone());
            if self.rebinder.rebind(&entry.bus_id).is_err() {
                report.rebinds_failed += 1;
            }
        }

        report
    }

    /// Poll until `max_cycles` is reached, or forever.
    ///
    /// Returns the number of cycles run. Does nothing unless `init`
    /// succeeded.
    pub fn run(&mut self, max_cycles: Option<u64>) -> u64 {
        if self.state != WatchdogState::Monitoring {
            warn!("Watchdog not initialized, not polling");
            return 0;
        }

        let mut ran = 0;
        loop {
            self.poll_once();
            ran += 1;
            if max_cycles.is_some_and(|max| ran >= max) {
                return ran;
            }
            self.rebinder.sleeper().sleep(self.poll_interval);
        }
    }
}

impl SystemWatchdog {
    /// Build a watchdog from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let query = UdevadmQuery::new(&settings.udevadm);
        let driver: BoxedDriver = if settings.sudo {
            Box::new(
                SudoTeeDriver::new(&settings.sysfs_root, &settings.driver)
                    .with_helper(&settings.sudo_helper),
            )
        } else {
            Box::new(SysfsDriver::new(&settings.sysfs_root, &settings.driver))
        };

        Self::new(
            Resolver::new(FsProbe, query),
            Rebinder::new(driver, ThreadSleeper, settings.rebind_timing()),
            settings.poll_interval(),
        )
    }
}

/// Camera devices from the teleop config; read or parse failures are logged
/// and read as "no cameras".
pub fn configured_devices(settings: &Settings) -> Vec<String> {
    match read_camera_devices(
        &settings.teleop_config,
        &settings.plugin_section,
        &settings.camera_key_prefix,
    ) {
        Ok(devices) => devices,
        Err(err) => {
            error!(error = %err, "Could not read camera configuration");
            Vec::new()
        }
    }
}
