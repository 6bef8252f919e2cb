//! Stable USB bus identifiers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Result, WatchdogError};

/// USB topology token inside a sysfs device path: bus-port chain, then
/// configuration and interface (`3-2:1.0`, `1-1.4.2:1.0`).
static BUS_ID_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+-[\d.]+:\d+\.\d+").expect("bus id pattern is valid"));

static BUS_ID_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-[\d.]+:\d+\.\d+$").expect("bus id pattern is valid"));

/// Stable identifier of a USB interface, as accepted by the driver's
/// `bind`/`unbind` files.
///
/// Survives `/dev/videoN` renumbering and is the only handle left once the
/// device node has vanished.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    /// Validate a complete bus id string.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if BUS_ID_EXACT.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(WatchdogError::InvalidBusId {
                value: value.to_string(),
            })
        }
    }

    /// Find the first bus id token inside a canonical device path such as
    /// `/devices/platform/.../usb3/3-2/3-2:1.0/video4linux/video0`.
    pub fn extract(device_path: &str) -> Option<Self> {
        BUS_ID_TOKEN
            .find(device_path)
            .map(|m| Self(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BusId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
