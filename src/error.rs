//! Error types for camera watchdog operations.

use thiserror::Error;

/// Primary error type for watchdog operations.
///
/// Every variant is tagged so callers can tell "stop the process" apart from
/// "log it and keep monitoring"; see [`WatchdogError::is_fatal`].
#[derive(Error, Debug)]
pub enum WatchdogError {
    // Configuration errors
    #[error("Failed to read camera configuration {path}: {reason}")]
    ConfigRead { path: String, reason: String },

    #[error("Camera configuration parse error in {path} (line {line}): {reason}")]
    ConfigParse {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Invalid settings file {path}: {reason}")]
    SettingsParse { path: String, reason: String },

    // Identity cache errors
    #[error("Could not load cache {path}: {reason}")]
    CacheRead { path: String, reason: String },

    #[error("Could not save cache {path}: {reason}")]
    CacheWrite { path: String, reason: String },

    // Detection errors
    #[error("Bus id query for {device} failed: {reason}")]
    QueryFailed { device: String, reason: String },

    #[error("Could not extract bus ID from path: {path}")]
    BusIdNotFound { path: String },

    #[error("Invalid bus id '{value}'")]
    InvalidBusId { value: String },

    // Recovery errors
    #[error("Failed to {action} {bus_id}: {reason}")]
    DriverControl {
        action: &'static str,
        bus_id: String,
        reason: String,
    },

    // Startup conditions
    #[error("No cameras found in configuration")]
    NoCamerasConfigured,

    #[error("No cameras could be mapped to a USB bus id")]
    NoCamerasResolved,

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl WatchdogError {
    /// Returns true if the watchdog cannot continue after this error.
    ///
    /// Everything else degrades monitoring coverage and is logged.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoCamerasConfigured | Self::NoCamerasResolved | Self::SettingsParse { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NoCamerasConfigured | Self::ConfigRead { .. } => {
                Some("Check the [plugin] section of the camera configuration (--config)")
            }
            Self::NoCamerasResolved => {
                Some("Connect the cameras once so their bus ids can be cached")
            }
            Self::DriverControl { .. } => {
                Some("Run as root, or set `sudo = true` with a matching sudoers rule")
            }
            Self::QueryFailed { .. } => Some("Ensure udevadm is installed and on PATH"),
            Self::SettingsParse { .. } => Some("Fix or remove the settings file (--settings)"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using WatchdogError.
pub type Result<T> = std::result::Result<T, WatchdogError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| WatchdogError::Other(format!("{}: {e}", f().into())))
    }
}
