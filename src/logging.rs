//! Structured logging initialization for the camera watchdog.
//!
//! Log lines go to the console and, unless disabled, are appended to a log file
//! so a headless robot keeps a record across restarts.

use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Filter directive for the given verbosity flags.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "camwd=error"
    } else {
        match verbose {
            0 => "camwd=info",
            1 => "camwd=debug",
            _ => "camwd=trace",
        }
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Where and how to log.
#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    /// JSON lines instead of text on the console.
    pub json: bool,
    /// Verbosity level: 0 = info, 1 = debug, 2+ = trace.
    pub verbose: u8,
    /// Only log errors.
    pub quiet: bool,
    /// Console logs go to stderr, keeping stdout for command output.
    pub stderr: bool,
    /// File to append plain-text log lines to.
    pub log_file: Option<&'a Path>,
}

/// Initialize the tracing subscriber.
///
/// # Environment Variables
///
/// * `RUST_LOG` - Override default filter (e.g., "camwd=debug")
///
/// # Output Behavior
///
/// | Mode | Console | File |
/// |------|---------|------|
/// | watch | text (or JSON) to stdout | plain text, appended |
/// | inspect | text (or JSON) to stderr | plain text, appended |
///
/// A log file that cannot be opened is reported once and skipped; the
/// watchdog keeps running with console output only.
pub fn init_logging(opts: &LogOptions<'_>) {
    let directive = default_directive(opts.verbose, opts.quiet);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let console = if opts.stderr {
        BoxMakeWriter::new(io::stderr)
    } else {
        BoxMakeWriter::new(io::stdout)
    };
    let console_is_tty = if opts.stderr {
        io::stderr().is_terminal()
    } else {
        io::stdout().is_terminal()
    };

    let console_layer = if opts.json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::NONE)
            .with_writer(console)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(console_is_tty)
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
            .compact()
            .with_writer(console)
            .boxed()
    };

    let mut file_error = None;
    let file_layer = opts.log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_span_events(FmtSpan::NONE)
                .with_writer(Mutex::new(file))
                .boxed(),
        ),
        Err(e) => {
            file_error = Some((path.display().to_string(), e));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some((path, error)) = file_error {
        warn!(path = %path, %error, "Could not open log file, logging to console only");
    }
}
