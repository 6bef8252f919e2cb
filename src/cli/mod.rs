//! CLI argument definitions and command dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::SettingsOverrides;

/// USB camera watchdog - rebinds the driver of cameras whose device node
/// has disappeared.
///
/// Without a subcommand the watchdog starts monitoring.
#[derive(Parser, Debug)]
#[command(name = "camwd", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct Cli {
    /// Output format for inspect/version (text for humans, json for scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "CAMWD_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (log errors only)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Show configuration and camera status, then exit (same as `inspect`)
    #[arg(long)]
    pub test: bool,

    /// Watchdog settings file (TOML)
    #[arg(long, global = true, env = "CAMWD_SETTINGS", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Teleop INI file declaring the camera pipelines
    #[arg(long, short = 'c', global = true, env = "CAMWD_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bus id cache file
    #[arg(long, global = true, env = "CAMWD_CACHE", value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Log file (appended to in addition to stdout)
    #[arg(long, global = true, env = "CAMWD_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log to stdout only
    #[arg(long, global = true)]
    pub no_log_file: bool,

    /// Seconds between existence checks
    #[arg(long, global = true, value_name = "SECS")]
    pub interval: Option<f64>,

    /// USB driver to rebind
    #[arg(long, global = true, env = "CAMWD_DRIVER")]
    pub driver: Option<String>,

    /// Write bind/unbind through `sudo -n tee`
    #[arg(long, global = true)]
    pub sudo: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }

    /// The command to run, treating `--test` as `inspect`.
    pub fn effective_command(&self) -> Commands {
        match &self.command {
            Some(cmd) => cmd.clone(),
            None if self.test => Commands::Inspect,
            None => Commands::Watch(WatchArgs::default()),
        }
    }

    /// Settings given as flags or environment variables.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            teleop_config: self.config.clone(),
            cache_file: self.cache.clone(),
            log_file: self.log_file.clone(),
            no_log_file: self.no_log_file,
            poll_interval_secs: self.interval,
            driver: self.driver.clone(),
            sudo: self.sudo,
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Monitor the configured cameras and rebind missing ones (default)
    Watch(WatchArgs),

    /// Show configuration, bus ids and camera status, then exit
    Inspect,

    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

#[derive(Parser, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Run a single check cycle and exit
    #[arg(long, conflicts_with = "cycles")]
    pub once: bool,

    /// Stop after this many check cycles (default: run until killed)
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,
}

impl WatchArgs {
    pub fn max_cycles(&self) -> Option<u64> {
        if self.once { Some(1) } else { self.cycles }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
