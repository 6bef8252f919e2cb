//! USB camera watchdog library.
//!
//! Keeps USB cameras alive on an embedded Linux host: when a `/dev/videoN`
//! node disappears, the camera's USB interface is unbound from and rebound
//! to its driver so the kernel re-enumerates it.
//!
//! # Modules
//!
//! - `cache`: Persistent device path → bus id cache
//! - `cli`: Command-line definitions
//! - `config`: Teleop INI reader and watchdog settings
//! - `device`: OS abstraction (existence probe, udev query, driver control)
//! - `error`: Error types with fatal/non-fatal classification
//! - `logging`: Console and log-file tracing setup
//! - `recovery`: Driver unbind/bind cycle
//! - `report`: Diagnostic inspection report
//! - `resolver`: Device path → bus id resolution and the Camera Map
//! - `watchdog`: The monitoring loop
#![forbid(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod recovery;
pub mod report;
pub mod resolver;
pub mod watchdog;
