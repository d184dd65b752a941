// src/runner/mod.rs

//! Command runner: execute the subject command and capture what it did.
//!
//! Every invocation gets the harness flags appended:
//! `-f <subject.config_file>` (when configured) and `-s <save file>`, where
//! the save file lives in a fresh temporary directory. Whatever the subject
//! writes there becomes [`CommandOutput::result`].
//!
//! Two execution modes ([`RunMode`]):
//! - out-of-process: a fresh OS process per invocation ([`out_of_process`]);
//! - in-process: a [`CommandDispatcher`] parses a fresh command tree per
//!   invocation with output captured in memory ([`in_process`]). There is no
//!   process isolation: the dispatcher must not keep state between calls.

pub mod in_process;
pub mod out_of_process;

use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SubjectConfig;
use crate::errors::{HarnessError, Result};
use crate::extract::ParsedResult;
use crate::subject::SubjectDispatcher;
use crate::types::{OutputFormat, RunMode};

/// In-memory stdout/stderr for in-process commands.
#[derive(Debug, Default, Clone)]
pub struct CapturedIo {
    pub out: Vec<u8>,
    pub err: Vec<u8>,
}

/// Runs one subject command inside the harness process.
///
/// Implementations must build everything (argument parser, flag state,
/// clients) from scratch on every call.
pub trait CommandDispatcher: Send + Sync + fmt::Debug {
    fn dispatch<'a>(
        &'a self,
        args: Vec<String>,
        io: &'a mut CapturedIo,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Everything captured from one successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The arguments as given by the caller, without harness flags.
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    /// Contents of the save file, if the subject wrote one.
    pub result: Option<String>,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// The save-file payload, falling back to stdout.
    pub fn payload(&self) -> &str {
        self.result.as_deref().unwrap_or(&self.stdout)
    }

    pub fn parse(&self, format: OutputFormat) -> Result<ParsedResult> {
        ParsedResult::from_output(self.payload(), format)
    }
}

/// One invocation after harness flags were added.
#[derive(Debug)]
pub(crate) struct Invocation {
    pub args: Vec<String>,
    pub argv: Vec<String>,
    pub save_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CommandRunner {
    config: SubjectConfig,
    dispatcher: Arc<dyn CommandDispatcher>,
}

impl CommandRunner {
    /// Runner using the bundled `emu` command tree for in-process mode.
    pub fn new(config: SubjectConfig) -> Self {
        Self {
            config,
            dispatcher: Arc::new(SubjectDispatcher),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &SubjectConfig {
        &self.config
    }

    /// Run in the configured mode.
    pub async fn run<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_with_mode(args, self.config.mode).await
    }

    pub async fn run_with_mode<I, S>(&self, args: I, mode: RunMode) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();

        // Dropped at the end of this call, removing the save file with it.
        let save_dir = tempfile::tempdir()?;
        let invocation = self.invocation(args, save_dir.path());

        debug!(args = ?invocation.args, ?mode, "running subject command");

        let dispatcher = self.dispatcher.as_ref();
        let (stdout, stderr, exit_code) = match mode {
            RunMode::OutOfProcess => out_of_process::run(&self.config, &invocation).await?,
            RunMode::InProcess => in_process::run(dispatcher, &self.config, &invocation).await?,
        };

        let result = read_save_file(&invocation.save_path)?;

        if exit_code != Some(0) {
            info!(args = ?invocation.args, ?exit_code, "subject command failed");
            return Err(HarnessError::Command {
                args: invocation.args,
                exit_code,
                stderr,
            });
        }

        Ok(CommandOutput {
            args: invocation.args,
            stdout,
            stderr,
            result,
            exit_code,
        })
    }

    fn invocation(&self, args: Vec<String>, save_dir: &Path) -> Invocation {
        let save_path = save_dir.join("result");

        let mut argv = args.clone();
        if let Some(config_file) = &self.config.config_file {
            argv.push("-f".to_string());
            argv.push(config_file.to_string_lossy().into_owned());
        }
        argv.push("-s".to_string());
        argv.push(save_path.to_string_lossy().into_owned());

        Invocation {
            args,
            argv,
            save_path,
        }
    }
}

fn read_save_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Debug)]
    struct Echo;

    impl CommandDispatcher for Echo {
        fn dispatch<'a>(
            &'a self,
            args: Vec<String>,
            io: &'a mut CapturedIo,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                if args.first().map(String::as_str) == Some("fail") {
                    io.err.extend_from_slice(b"went wrong\n");
                    anyhow::bail!("refused");
                }
                if args.first().map(String::as_str) == Some("hang") {
                    std::future::pending::<()>().await;
                }
                io.out.extend_from_slice(args.join(" ").as_bytes());
                let save = args
                    .iter()
                    .position(|a| a == "-s")
                    .and_then(|i| args.get(i + 1))
                    .ok_or_else(|| anyhow::anyhow!("no save flag"))?;
                std::fs::write(save, "saved")?;
                Ok(())
            })
        }
    }

    fn runner(config_file: Option<&str>) -> CommandRunner {
        let config = SubjectConfig {
            config_file: config_file.map(PathBuf::from),
            mode: RunMode::InProcess,
            timeout: Duration::from_millis(500),
            ..SubjectConfig::default()
        };
        CommandRunner::new(config).with_dispatcher(Arc::new(Echo))
    }

    #[tokio::test]
    async fn appends_harness_flags_and_reads_save_file() {
        let out = runner(Some("emu.toml")).run(["accounts", "get"]).await.unwrap();
        assert_eq!(out.args, vec!["accounts", "get"]);
        assert!(out.stdout.starts_with("accounts get -f emu.toml -s "));
        assert_eq!(out.result.as_deref(), Some("saved"));
        assert_eq!(out.payload(), "saved");
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn dispatcher_error_becomes_command_error_with_stderr() {
        let err = runner(None).run(["fail"]).await.unwrap_err();
        match err {
            HarnessError::Command { args, stderr, .. } => {
                assert_eq!(args, vec!["fail"]);
                assert!(stderr.contains("went wrong"));
                assert!(stderr.contains("refused"));
            }
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_process_timeout_is_reported() {
        let err = runner(None).run(["hang"]).await.unwrap_err();
        assert!(matches!(err, HarnessError::CommandTimedOut { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn out_of_process_timeout_covers_inherited_output_pipes() {
        // `sh` exits at once, but the backgrounded sleep keeps stdout open.
        let runner = CommandRunner::new(SubjectConfig {
            program: Some(PathBuf::from("sh")),
            mode: RunMode::OutOfProcess,
            timeout: Duration::from_millis(500),
            ..SubjectConfig::default()
        });

        let started = std::time::Instant::now();
        let err = runner.run(["-c", "sleep 4 & echo hi"]).await.unwrap_err();

        assert!(matches!(err, HarnessError::CommandTimedOut { .. }), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
