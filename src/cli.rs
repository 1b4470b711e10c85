// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::loader::DEFAULT_CONFIG_NAME;

/// Command-line arguments for `assetpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetpipe",
    version,
    about = "Build, watch and serve a front-end asset tree from a stage DAG.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Assetpipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_NAME, global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: PipelineCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PipelineCommand {
    /// Run the full stage DAG once and exit.
    Build {
        /// Parse + validate, print the stage graph, but don't execute anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the pipeline, then watch sources and serve the output tree.
    Watch {
        /// Dev server port; overrides `[project].port` from the config.
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
    },
    /// Recursively delete the output tree.
    Clean,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
