//! cli
//!
//! Command-line interface layer for polyforge.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the tracing subscriber
//! - Resolve the target repository and delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, builds a
//! [`commands::Context`] from flags and configuration, and dispatches to
//! handlers that call the [`crate::forge`] library.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let config = Config::load()?;
    let ctx = commands::Context {
        cwd: cli.cwd,
        json: cli.json,
        token: cli.token,
        forge: cli.forge,
        remote: cli.remote,
        config,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Log to stderr, filtered by `RUST_LOG`; `--debug` forces debug output for
/// this crate.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("polyforge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
