//! Configuration for the camera watchdog.
//!
//! Two sources: the teleop INI file that declares which cameras exist
//! ([`plugin`]), and the watchdog's own TOML settings ([`settings`]).

mod path;
mod plugin;
mod settings;

pub use path::{default_settings_path, home_dir, resolve_path};
pub use plugin::{extract_device_path, parse_camera_devices, read_camera_devices};
pub use settings::{
    DEFAULT_CACHE_FILE, DEFAULT_LOG_FILE, DEFAULT_TELEOP_CONFIG, Settings, SettingsOverrides,
};
