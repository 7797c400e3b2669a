//! CLI command definitions for the `cadence` binary.

pub mod bench;
pub mod chat;
pub mod user;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use cadence_observe::tracing_setup::LogFormat;

/// Conversational music recommendations.
#[derive(Parser)]
#[command(name = "cadence", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory (database, indices, model cache).
    #[arg(long, global = true, env = "CADENCE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Config file. Defaults to `<data-dir>/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log line format.
    #[arg(long, global = true, default_value = "pretty", env = "CADENCE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Fallback log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => cadence_observe::tracing_setup::DEFAULT_FILTER,
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on. Defaults to `[server].port`.
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to. Defaults to `[server].host`.
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Send one message and print the reply.
    Chat {
        /// Message text.
        message: String,

        /// Act as this user (playlists, history and memories are theirs).
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Run scripted benchmark cases from a JSONC file.
    Bench {
        /// Path to the cases file.
        #[arg(default_value = "data/bench_cases.jsonc")]
        cases: PathBuf,

        /// Write full results as JSON to this file.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Comma-separated case ids to run (e.g. C01,C02).
        #[arg(long)]
        only: Option<String>,

        /// Root for the per-case memory directories.
        #[arg(long, default_value = ".bench/memory")]
        memory_root: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user and print their access token.
    Create {
        /// Unique username.
        username: String,
    },
}
