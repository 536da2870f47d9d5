//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};
use deskpilot::build_info;

/// Streaming orchestrator for screen-driving agent sessions.
#[derive(Debug, Parser)]
#[command(
    name = "deskpilot",
    version = build_info::cli_version_text(),
    after_help = build_info::HELP_BUILD_METADATA
)]
pub struct Args {
    /// Path to config file (default: ./deskpilot.toml or
    /// ~/.config/deskpilot/deskpilot.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Override the configured planning model name.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the session server. This is the default when no subcommand is
    /// given.
    Serve {
        /// Override the configured listen address.
        #[arg(long = "listen", value_name = "ADDR")]
        listen: Option<String>,
    },
    /// Write the default global config file.
    Init {
        /// Replace an existing global config, keeping a timestamped backup.
        #[arg(long = "force")]
        force: bool,
    },
    /// Rebuild the conversation view from a captured event stream (one JSON
    /// event per line) and print it.
    Replay {
        /// Path to the captured stream; reads stdin when omitted.
        file: Option<String>,
    },
}
