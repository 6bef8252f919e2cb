//! Runtime settings for the watchdog.
//!
//! Precedence, lowest first: built-in defaults, the optional TOML settings
//! file, then command-line flags and environment variables
//! ([`SettingsOverrides`]).
//!
//! # Example TOML
//!
//! ```toml
//! teleop_config = "/opt/frodobots/teleop.ini"
//! cache_file = "/var/lib/camwd/cache.json"
//! poll_interval_secs = 5
//! driver = "uvcvideo"
//! sudo = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::path::resolve_path;
use crate::error::{Result, WatchdogError};
use crate::recovery::RebindTiming;

pub const DEFAULT_TELEOP_CONFIG: &str = "/opt/frodobots/teleop.ini";
pub const DEFAULT_CACHE_FILE: &str = "/tmp/camera_watchdog_cache.json";
pub const DEFAULT_LOG_FILE: &str = "/var/log/camera_watchdog.log";

/// All tunables of a watchdog run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// INI file declaring the camera pipelines.
    pub teleop_config: PathBuf,
    /// Section of the INI file holding the pipelines.
    pub plugin_section: String,
    /// Key prefix marking camera pipelines.
    pub camera_key_prefix: String,
    /// JSON identity cache.
    pub cache_file: PathBuf,
    /// Log file appended to alongside stdout.
    pub log_file: PathBuf,
    /// Set to false to log to stdout only.
    pub log_to_file: bool,
    /// Seconds between existence checks.
    pub poll_interval_secs: f64,
    /// Seconds to wait after unbind.
    pub unbind_settle_secs: f64,
    /// Seconds to wait after bind for re-enumeration.
    pub bind_settle_secs: f64,
    /// USB driver owning the cameras.
    pub driver: String,
    /// Root of the sysfs mount.
    pub sysfs_root: PathBuf,
    /// udev query tool.
    pub udevadm: PathBuf,
    /// Write bind/unbind through `sudo -n tee` instead of directly.
    pub sudo: bool,
    /// Escalation helper used when `sudo` is set.
    pub sudo_helper: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            teleop_config: PathBuf::from(DEFAULT_TELEOP_CONFIG),
            plugin_section: "plugin".to_string(),
            camera_key_prefix: "camera".to_string(),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_to_file: true,
            poll_interval_secs: 5.0,
            unbind_settle_secs: 2.0,
            bind_settle_secs: 3.0,
            driver: "uvcvideo".to_string(),
            sysfs_root: PathBuf::from("/sys"),
            udevadm: PathBuf::from("udevadm"),
            sudo: false,
            sudo_helper: PathBuf::from("sudo"),
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub teleop_config: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub no_log_file: bool,
    pub poll_interval_secs: Option<f64>,
    pub driver: Option<String>,
    pub sudo: bool,
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// When `required` is false a missing file yields the defaults; the
    /// default settings location is optional, an explicit `--settings` is
    /// not.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(WatchdogError::SettingsParse {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let settings = Self::from_toml(&content, base_dir).map_err(|e| match e {
            WatchdogError::SettingsParse { reason, .. } => WatchdogError::SettingsParse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;

        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Parse TOML settings, resolving relative paths against `base_dir`.
    pub fn from_toml(content: &str, base_dir: &Path) -> Result<Self> {
        let mut settings: Self =
            toml::from_str(content).map_err(|e| WatchdogError::SettingsParse {
                path: "<input>".to_string(),
                reason: e.to_string(),
            })?;

        settings.teleop_config = resolve_path(&settings.teleop_config, base_dir)?;
        settings.cache_file = resolve_path(&settings.cache_file, base_dir)?;
        settings.log_file = resolve_path(&settings.log_file, base_dir)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply command-line and environment overrides.
    pub fn apply(mut self, overrides: &SettingsOverrides) -> Result<Self> {
        if let Some(path) = &overrides.teleop_config {
            self.teleop_config.clone_from(path);
        }
        if let Some(path) = &overrides.cache_file {
            self.cache_file.clone_from(path);
        }
        if let Some(path) = &overrides.log_file {
            self.log_file.clone_from(path);
            self.log_to_file = true;
        }
        if overrides.no_log_file {
            self.log_to_file = false;
        }
        if let Some(secs) = overrides.poll_interval_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(driver) = &overrides.driver {
            self.driver.clone_from(driver);
        }
        if overrides.sudo {
            self.sudo = true;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        duration_setting("poll_interval_secs", self.poll_interval_secs)?;
        duration_setting("unbind_settle_secs", self.unbind_settle_secs)?;
        duration_setting("bind_settle_secs", self.bind_settle_secs)?;
        if self.driver.is_empty() || self.driver.contains('/') {
            return Err(WatchdogError::SettingsParse {
                path: "<settings>".to_string(),
                reason: format!("invalid driver name '{}'", self.driver),
            });
        }
        Ok(())
    }

    /// Pause between existence checks.
    ///
    /// Values that would not pass validation saturate to `Duration::MAX`.
    pub fn poll_interval(&self) -> Duration {
        saturating_duration(self.poll_interval_secs)
    }

    pub fn rebind_timing(&self) -> RebindTiming {
        RebindTiming {
            unbind_settle: saturating_duration(self.unbind_settle_secs),
            bind_settle: saturating_duration(self.bind_settle_secs),
        }
    }

    /// Log file to open, if file logging is enabled.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_to_file.then_some(self.log_file.as_path())
    }
}

/// Seconds from a settings value as a `Duration`, rejecting negative,
/// non-finite and out-of-range values.
fn duration_setting(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| WatchdogError::SettingsParse {
        path: "<settings>".to_string(),
        reason: format!("{name} must be a non-negative number of seconds, got {secs} ({e})"),
    })
}

fn saturating_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
