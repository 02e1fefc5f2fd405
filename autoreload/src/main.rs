//! `autoreload`: rerun a command whenever watched files change.
//!
//! ```bash
//! autoreload --watch src --watch 'templates/*.html' -- ./target/debug/server --port 8080
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use autoreload::exit_codes;
use autoreload::io::config::{ConfigOverrides, DEFAULT_CONFIG_FILE, apply_overrides, load_config};
use autoreload::{launch_command, logging};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "autoreload",
    version,
    about = "Restart a command whenever watched files change"
)]
struct Cli {
    /// Config file (TOML). Defaults to `autoreload.toml` if present.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Heartbeat pulse and file poll interval in milliseconds.
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Extra slack before a silent supervisor is considered gone.
    #[arg(long, value_name = "MS")]
    grace_ms: Option<u64>,

    /// File, directory or glob to watch. Repeatable.
    #[arg(short, long = "watch", value_name = "PATTERN")]
    watch: Vec<String>,

    /// Do not watch the command's own executable.
    #[arg(long)]
    no_watch_command: bool,

    /// Directory for the heartbeat file.
    #[arg(long, value_name = "DIR")]
    heartbeat_dir: Option<PathBuf>,

    /// Command to run, followed by its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<OsString>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            interval_ms: self.interval_ms,
            grace_ms: self.grace_ms,
            watch: self.watch.clone(),
            watch_executable: self.no_watch_command.then_some(false),
            heartbeat_dir: self.heartbeat_dir.clone(),
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILURE);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) if !path.exists() => bail!("config file {} not found", path.display()),
        Some(path) => path.clone(),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };
    let config = apply_overrides(load_config(&config_path)?, &cli.overrides())?;
    let (program, args) = cli
        .command
        .split_first()
        .context("missing command to supervise")?;
    launch_command(&config, program, args)
}
