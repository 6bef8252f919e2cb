//! camwd - USB camera watchdog.
//!
//! Monitors the cameras declared in the teleop config and rebinds the USB
//! driver of any camera whose device node disappears.
#![forbid(unsafe_code)]

use std::io::{self, IsTerminal, Write};

use clap::Parser;
use console::style;
use serde::Serialize;
use tracing::info;

use camwd::cache::IdentityCache;
use camwd::cli::{Cli, Commands, CompletionsArgs, WatchArgs};
use camwd::config::{Settings, default_settings_path};
use camwd::device::{FsProbe, UdevadmQuery};
use camwd::error::{Result, ResultExt, WatchdogError};
use camwd::logging::{LogOptions, init_logging};
use camwd::report::InspectReport;
use camwd::resolver::Resolver;
use camwd::watchdog::{SystemWatchdog, configured_devices};

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> &'static str {
        option_env!("VERGEN_GIT_DIRTY").unwrap_or("false")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();

    // Handle no-color flag or non-TTY
    if cli.no_color || !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match cli.effective_command() {
        Commands::Watch(args) => cmd_watch(cli, &args),
        Commands::Inspect => cmd_inspect(cli),
        Commands::Version => cmd_version(cli),
        Commands::Completions(args) => {
            cmd_completions(&args);
            Ok(())
        }
    }
}

/// Defaults, then the settings file, then flags and environment.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match (&cli.settings, default_settings_path()) {
        (Some(path), _) => Settings::load(path, true)?,
        (None, Some(path)) => Settings::load(&path, false)?,
        (None, None) => Settings::default(),
    };
    settings.apply(&cli.overrides())
}

// === Command Implementations ===

fn cmd_watch(cli: &Cli, args: &WatchArgs) -> Result<()> {
    let settings = load_settings(cli)?;
    init_logging(&LogOptions {
        json: cli.use_json(),
        verbose: cli.verbose,
        quiet: cli.quiet,
        stderr: false,
        log_file: settings.log_file(),
    });

    info!(
        config = %settings.teleop_config.display(),
        cache = %settings.cache_file.display(),
        driver = %settings.driver,
        "Camera watchdog started"
    );

    let devices = configured_devices(&settings);
    let mut cache = IdentityCache::load(&settings.cache_file);
    let mut watchdog = SystemWatchdog::from_settings(&settings);
    watchdog.init(&devices, &mut cache)?;

    let cycles = watchdog.run(args.max_cycles());
    info!(cycles, "Camera watchdog stopped");
    Ok(())
}

fn cmd_inspect(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    init_logging(&LogOptions {
        json: cli.use_json(),
        verbose: cli.verbose,
        quiet: cli.quiet,
        stderr: true,
        log_file: settings.log_file(),
    });

    let devices = configured_devices(&settings);
    let mut cache = IdentityCache::load(&settings.cache_file);
    let resolver = Resolver::new(FsProbe, UdevadmQuery::new(&settings.udevadm));
    let report = InspectReport::build(&settings, devices, &resolver, &mut cache);

    if cli.use_json() {
        output_json(cli, &report)?;
    } else {
        print!("{}", report.render_human());
        if report.startup_error().is_none() {
            println!("Inspection complete. Run without --test to start the watchdog.");
        }
    }

    report.into_result().map(|_| ())
}

fn cmd_version(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        return output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty() == "true",
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        );
    }

    println!("camwd {}", build_info::VERSION);
    println!(
        "git: {}{}",
        build_info::git_sha(),
        if build_info::git_dirty() == "true" {
            " (dirty)"
        } else {
            ""
        }
    );
    println!("built: {}", build_info::build_timestamp());
    println!("rustc: {}", build_info::rustc_semver());
    println!("target: {}", build_info::target());
    Ok(())
}

fn cmd_completions(args: &CompletionsArgs) {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "camwd", &mut io::stdout());
}

// === Utility Functions ===

fn output_json<T: Serialize>(cli: &Cli, data: &T) -> Result<()> {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    let json = json.with_context(|| "serializing output")?;
    writeln!(io::stdout().lock(), "{json}")?;
    Ok(())
}

fn output_error(cli: &Cli, error: &WatchdogError) {
    if cli.use_json() {
        let json = serde_json::json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "fatal": error.is_fatal(),
        });
        eprintln!("{json}");
    } else {
        eprintln!("{}: {}", style("Error").red().bold(), error);
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
