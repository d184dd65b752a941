// src/cli.rs

//! CLI argument parsing for the `emuharness` binary, using `clap` derive.

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::{OutputFormat, RunMode};

/// Command-line arguments for `emuharness`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "emuharness",
    version,
    about = "Start an emulator service, wait until it is ready and drive commands against it.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the harness config file (TOML).
    ///
    /// Default: `Emuharness.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Emuharness.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EMUHARNESS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print the plan, start nothing.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: HarnessCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum HarnessCommand {
    /// Start the service and keep it running until Ctrl-C.
    Up,
    /// Start the service, run one subject command against it, then stop.
    Exec {
        /// Override `[subject].mode`.
        #[arg(long, value_name = "MODE")]
        mode: Option<RunMode>,

        /// Parse the result in this format and print the extracted fields.
        #[arg(long, value_name = "FORMAT")]
        parse: Option<OutputFormat>,

        /// Subject arguments, e.g. `-- accounts create -o json`.
        #[arg(last = true, required = true, value_name = "ARGS")]
        args: Vec<String>,
    },
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_takes_trailing_subject_args() {
        let args = CliArgs::try_parse_from([
            "emuharness",
            "--config",
            "h.toml",
            "exec",
            "--mode",
            "in-process",
            "--",
            "accounts",
            "create",
            "-o",
            "json",
        ])
        .unwrap();

        assert_eq!(args.config, "h.toml");
        match args.command {
            HarnessCommand::Exec { mode, parse, args } => {
                assert_eq!(mode, Some(RunMode::InProcess));
                assert_eq!(parse, None);
                assert_eq!(args, vec!["accounts", "create", "-o", "json"]);
            }
            other => panic!("expected exec, got {other:?}"),
        }
    }
}
