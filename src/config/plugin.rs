//! Camera device extraction from the teleop INI file.
//!
//! The teleop config declares its GStreamer pipelines in a `[plugin]`
//! section, one entry per camera:
//!
//! ```ini
//! [plugin]
//! camera1 = v4l2src device=/dev/video0 ! video/x-raw,width=640 ! ...
//! camera2 = v4l2src device=/dev/v4l/by-id/usb-cam-video-index0 ! ...
//! ```
//!
//! Only the `device=` argument matters here. The INI reader follows the
//! layout rules of Python's `configparser`: section headers, `key = value`
//! and `key: value` entries, `#`/`;` comment lines, and continuation lines
//! indented deeper than their key. Blank lines inside a continued value are
//! kept. Entries of `[DEFAULT]` are inherited by the scanned section unless it
//! sets the same key. Value interpolation (`%(name)s`) is not supported and
//! values are returned verbatim.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, trace};

use crate::error::{Result, WatchdogError};

static DEVICE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"device=([^\s!]+)").expect("device pattern is valid"));

/// Extract the path from the first `device=<path>` token of a pipeline.
pub fn extract_device_path(value: &str) -> Option<&str> {
    DEVICE_TOKEN
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Read `path` and return the camera devices declared in `section`.
pub fn read_camera_devices(path: &Path, section: &str, key_prefix: &str) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| WatchdogError::ConfigRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let devices = parse_camera_devices(&text, section, key_prefix).map_err(|e| match e {
        WatchdogError::ConfigParse { line, reason, .. } => WatchdogError::ConfigParse {
            path: path.display().to_string(),
            line,
            reason,
        },
        other => other,
    })?;

    info!(count = devices.len(), ?devices, "Found camera devices");
    Ok(devices)
}

/// Camera devices declared in `section` of INI `text`, in file order.
///
/// Keys are matched case-insensitively against `key_prefix`. Entries
/// without a `device=` token are skipped. A missing section yields an empty
/// list.
pub fn parse_camera_devices(text: &str, section: &str, key_prefix: &str) -> Result<Vec<String>> {
    let prefix = key_prefix.to_lowercase();
    let devices = section_entries(text, section)?
        .into_iter()
        .filter(|(key, _)| key.starts_with(&prefix))
        .filter_map(|(key, value)| {
            let device = extract_device_path(&value).map(str::to_string);
            if device.is_none() {
                debug!(key, "Camera entry has no device= token");
            }
            device
        })
        .collect();
    Ok(devices)
}

/// Section whose entries every other section inherits.
const DEFAULT_SECTION: &str = "DEFAULT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Wanted,
    Defaults,
    Other,
}

/// `(lower-cased key, value)` pairs of one INI section, followed by the
/// `[DEFAULT]` entries it does not override.
fn section_entries(text: &str, wanted: &str) -> Result<Vec<(String, String)>> {
    let parse_error = |line: usize, reason: String| WatchdogError::ConfigParse {
        path: "<input>".to_string(),
        line,
        reason,
    };

    let mut entries: Vec<(String, String)> = Vec::new();
    let mut defaults: Vec<(String, String)> = Vec::new();
    let mut target: Option<Target> = None;
    let mut found = false;
    // Indentation of the entry whose value is still open.
    let mut value_indent: Option<usize> = None;
    let mut pending_blanks = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            if value_indent.is_some() {
                pending_blanks += 1;
            }
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indent = raw.len() - raw.trim_start().len();
        if value_indent.is_some_and(|open| indent > open) {
            let list = match target {
                Some(Target::Wanted) => Some(&mut entries),
                Some(Target::Defaults) => Some(&mut defaults),
                _ => None,
            };
            if let Some((_, value)) = list.and_then(|l| l.last_mut()) {
                for _ in 0..pending_blanks {
                    value.push('\n');
                }
                value.push('\n');
                value.push_str(trimmed);
            }
            pending_blanks = 0;
            continue;
        }
        pending_blanks = 0;

        if let Some(name) = trimmed.strip_prefix('[') {
            let name = name
                .strip_suffix(']')
                .ok_or_else(|| parse_error(line_no, format!("unterminated section header: {trimmed}")))?
                .trim();
            trace!(section = name, "INI section");
            target = Some(if name == wanted {
                found = true;
                Target::Wanted
            } else if name == DEFAULT_SECTION {
                Target::Defaults
            } else {
                Target::Other
            });
            value_indent = None;
            continue;
        }

        let Some(split) = trimmed.find(['=', ':']) else {
            return Err(parse_error(line_no, format!("expected key = value, got: {trimmed}")));
        };
        if target.is_none() {
            return Err(parse_error(line_no, "entry before any section header".to_string()));
        }

        let key = trimmed[..split].trim().to_lowercase();
        let value = trimmed[split + 1..].trim().to_string();
        if key.is_empty() {
            return Err(parse_error(line_no, "empty key".to_string()));
        }

        let (list, section) = match target {
            Some(Target::Wanted) => (Some(&mut entries), wanted),
            Some(Target::Defaults) => (Some(&mut defaults), DEFAULT_SECTION),
            _ => (None, ""),
        };
        if let Some(list) = list {
            if list.iter().any(|(k, _)| *k == key) {
                return Err(parse_error(line_no, format!("duplicate key '{key}' in [{section}]")));
            }
            list.push((key, value));
        }
        value_indent = Some(indent);
    }

    if wanted == DEFAULT_SECTION {
        return Ok(defaults);
    }
    if !found {
        return Ok(Vec::new());
    }
    for (key, value) in defaults {
        if !entries.iter().any(|(k, _)| *k == key) {
            entries.push((key, value));
        }
    }
    Ok(entries)
}
