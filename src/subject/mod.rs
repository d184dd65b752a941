// src/subject/mod.rs

//! `emu`: the subject CLI driven by the harness.
//!
//! The same command tree backs the `emu` binary and in-process runs. Each
//! call to [`run_subject`] parses a fresh [`SubjectCli`], so flags from one
//! invocation can never leak into the next.

use std::fmt::Write as _;
use std::future::Future;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result, bail};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::devnet::{Account, Request, Response, call};
use crate::runner::{CapturedIo, CommandDispatcher};
use crate::types::OutputFormat;

pub const DEFAULT_CONFIG_FILE: &str = "emu.toml";
pub const DEFAULT_HOST: &str = "127.0.0.1:3570";

#[derive(Debug, Clone, Parser)]
#[command(name = "emu", version, about = "Talk to a local emu devnet.", long_about = None)]
pub struct SubjectCli {
    /// Configuration file.
    #[arg(short = 'f', long = "config", global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output format (text, json).
    #[arg(short = 'o', long = "output", global = true, value_name = "FORMAT", default_value = "text")]
    pub output: OutputFormat,

    /// Also write the command result to this file.
    #[arg(short = 's', long = "save", global = true, value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// Devnet address, overriding the configuration file.
    #[arg(long, global = true, value_name = "HOST:PORT")]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: SubjectCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SubjectCommand {
    /// Write a new configuration file.
    Init,
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum AccountsCommand {
    /// Create a new account.
    Create {
        /// Public key to attach (repeatable).
        #[arg(long = "key", value_name = "HEX")]
        keys: Vec<String>,
    },
    /// Show an account.
    Get { address: String },
}

/// Contents of the subject's configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSettings {
    pub host: String,
}

/// Parse `args` (without the program name) and run the command, writing
/// stdout and stderr into `io`.
pub async fn run_subject(args: Vec<String>, io: &mut CapturedIo) -> Result<()> {
    let argv = std::iter::once("emu".to_string()).chain(args);
    let cli = match SubjectCli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            write!(io.out, "{e}")?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    debug!(command = ?cli.command, output = %cli.output, "running emu command");

    let rendered = match &cli.command {
        SubjectCommand::Init => init(&cli)?,
        SubjectCommand::Accounts { command } => {
            let host = resolve_host(&cli)?;
            let account = match command {
                AccountsCommand::Create { keys } => {
                    expect_account(call(&host, &Request::CreateAccount { keys: keys.clone() }).await?)?
                }
                AccountsCommand::Get { address } => {
                    expect_account(call(&host, &Request::GetAccount { address: address.clone() }).await?)?
                }
            };
            render_account(&account, cli.output)?
        }
    };

    io.out.extend_from_slice(rendered.as_bytes());
    if let Some(save) = &cli.save {
        std::fs::write(save, &rendered)
            .with_context(|| format!("saving result to {}", save.display()))?;
    }
    Ok(())
}

fn init(cli: &SubjectCli) -> Result<String> {
    if cli.config.exists() {
        bail!("configuration already exists at {}", cli.config.display());
    }

    let settings = SubjectSettings {
        host: cli.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
    };
    std::fs::write(&cli.config, toml::to_string(&settings)?)
        .with_context(|| format!("writing {}", cli.config.display()))?;

    match cli.output {
        OutputFormat::Json => Ok(format!(
            "{}\n",
            serde_json::json!({ "config": cli.config, "host": settings.host })
        )),
        OutputFormat::Text => Ok(format!(
            "Configuration initialized\nConfig\t {}\nHost\t {}\n",
            cli.config.display(),
            settings.host
        )),
    }
}

fn resolve_host(cli: &SubjectCli) -> Result<String> {
    if let Some(host) = &cli.host {
        return Ok(host.clone());
    }
    Ok(load_settings(&cli.config)?.host)
}

fn load_settings(path: &Path) -> Result<SubjectSettings> {
    let contents = std::fs::read_to_string(path).with_context(|| {
        format!(
            "reading configuration {} (run `emu init` first)",
            path.display()
        )
    })?;
    toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn expect_account(response: Response) -> Result<Account> {
    match response {
        Response::Account { account } => Ok(account),
        Response::Error { message } => bail!("devnet error: {message}"),
        other => bail!("unexpected devnet response: {other:?}"),
    }
}

fn render_account(account: &Account, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string(account)?)),
        OutputFormat::Text => {
            let mut out = String::new();
            writeln!(out, "Address\t {}", account.address)?;
            writeln!(out, "Balance\t {}", account.balance)?;
            for key in &account.keys {
                writeln!(out, "Key\t {key}")?;
            }
            for contract in &account.contracts {
                writeln!(out, "Contract\t {contract}")?;
            }
            Ok(out)
        }
    }
}

/// In-process dispatcher for the `emu` command tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectDispatcher;

impl CommandDispatcher for SubjectDispatcher {
    fn dispatch<'a>(
        &'a self,
        args: Vec<String>,
        io: &'a mut CapturedIo,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(run_subject(args, io))
    }
}
