//! Diagnostic report for `camwd inspect`.
//!
//! Runs the same startup resolution as the monitoring loop (including cache
//! updates) and shows, per camera, its bus id, where the id came from and
//! whether the node exists right now.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use console::style;
use serde::Serialize;

use crate::cache::IdentityCache;
use crate::config::Settings;
use crate::device::{BusId, BusIdQuery, DeviceProbe};
use crate::error::{Result, WatchdogError};
use crate::resolver::{Resolver, Source};

/// Current status of one mapped camera.
#[derive(Debug, Clone, Serialize)]
pub struct CameraStatus {
    pub device: String,
    pub bus_id: BusId,
    pub source: Source,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

/// Result of an inspection run.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub generated_at: DateTime<Local>,
    pub teleop_config: String,
    pub cache_file: String,
    /// Devices named in the teleop config.
    pub configured: Vec<String>,
    /// Configured devices that could not be mapped.
    pub unresolved: Vec<String>,
    pub cameras: Vec<CameraStatus>,
}

impl InspectReport {
    /// Resolve `configured` and snapshot each camera's status.
    pub fn build<P, Q>(
        settings: &Settings,
        configured: Vec<String>,
        resolver: &Resolver<P, Q>,
        cache: &mut IdentityCache,
    ) -> Self
    where
        P: DeviceProbe,
        Q: BusIdQuery,
    {
        let map = resolver.build_camera_map(&configured, cache);
        let probe = resolver.probe();

        let cameras = map
            .entries()
            .iter()
            .map(|entry| CameraStatus {
                device: entry.device.clone(),
                bus_id: entry.bus_id.clone(),
                source: entry.source,
                exists: probe.exists(&entry.device),
                symlink_target: probe
                    .symlink_target(&entry.device)
                    .map(|p| p.display().to_string()),
            })
            .collect();

        let unresolved = configured
            .iter()
            .filter(|d| map.get(d).is_none())
            .cloned()
            .collect();

        Self {
            generated_at: Local::now(),
            teleop_config: settings.teleop_config.display().to_string(),
            cache_file: settings.cache_file.display().to_string(),
            configured,
            unresolved,
            cameras,
        }
    }

    /// The condition monitoring would stop on, if any.
    pub fn startup_error(&self) -> Option<WatchdogError> {
        if self.configured.is_empty() {
            Some(WatchdogError::NoCamerasConfigured)
        } else if self.cameras.is_empty() {
            Some(WatchdogError::NoCamerasResolved)
        } else {
            None
        }
    }

    /// `Ok` if monitoring would start with this configuration.
    pub fn into_result(self) -> Result<Self> {
        match self.startup_error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    pub fn missing_count(&self) -> usize {
        self.cameras.iter().filter(|c| !c.exists).count()
    }

    /// Human-readable rendering.
    pub fn render_human(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", style("Camera Watchdog Configuration").bold());
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "  config: {}", self.teleop_config);
        let _ = writeln!(out, "  cache:  {}", self.cache_file);
        let _ = writeln!(out);

        let _ = writeln!(out, "1. Parsing camera configuration...");
        if self.configured.is_empty() {
            let _ = writeln!(out, "   {}", style("No devices found!").red());
            return out;
        }
        let _ = writeln!(
            out,
            "   {} Parsed {} camera(s)",
            style("ok").green(),
            self.configured.len()
        );

        let _ = writeln!(out, "\n2. Building camera map...");
        for device in &self.unresolved {
            let _ = writeln!(out, "   {} {device}: no bus id", style("skip").yellow());
        }
        if self.cameras.is_empty() {
            let _ = writeln!(out, "   {}", style("No cameras mapped!").red());
            return out;
        }
        let _ = writeln!(
            out,
            "   {} Mapped {} camera(s)",
            style("ok").green(),
            self.cameras.len()
        );

        let _ = writeln!(out, "\n3. Current camera status:");
        let _ = writeln!(out, "{}", "-".repeat(60));
        for cam in &self.cameras {
            let status = if cam.exists {
                style("EXISTS").green()
            } else {
                style("MISSING").red()
            };
            let source = match cam.source {
                Source::Live => "",
                Source::Cache => " (from cache)",
            };
            let _ = writeln!(
                out,
                "   {:20} -> {:15} [{status}]{source}",
                cam.device,
                cam.bus_id.as_str()
            );
            if let Some(target) = &cam.symlink_target {
                let _ = writeln!(out, "     symlink to: {target}");
            }
        }
        let _ = writeln!(out, "{rule}");
        out
    }
}
