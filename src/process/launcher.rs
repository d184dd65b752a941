// src/process/launcher.rs

//! Process launcher: turn a [`LaunchSpec`] into a running [`ManagedProcess`].

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

use crate::errors::{HarnessError, Result};

/// What to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// A program path, or a bare name looked up on `PATH`.
    Program(PathBuf),
    /// Build and run a binary from source: `cargo run --quiet --bin <bin>`.
    CargoBin {
        bin: String,
        manifest_path: Option<PathBuf>,
    },
}

/// Everything needed to start one service process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub name: String,
    pub target: LaunchTarget,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    pub fn program(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target: LaunchTarget::Program(program.into()),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = match &self.target {
            LaunchTarget::Program(path) => {
                let mut c = Command::new(path);
                c.args(&self.args);
                c
            }
            LaunchTarget::CargoBin { bin, manifest_path } => {
                let mut c = Command::new("cargo");
                c.args(["run", "--quiet", "--bin", bin.as_str()]);
                if let Some(manifest) = manifest_path {
                    c.arg("--manifest-path").arg(manifest);
                }
                c.arg("--").args(&self.args);
                c
            }
        };

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&self.env);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Ownership wrapper around one OS process and its output handles.
///
/// Not `Clone`: exactly one `ManagedProcess` represents a given child. The
/// child was spawned with `kill_on_drop(true)`, so dropping an unstopped
/// process kills it.
#[derive(Debug)]
pub struct ManagedProcess {
    name: String,
    child: Child,
    pid: Option<u32>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ManagedProcess {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// PID recorded at launch.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// PID of the child if it has not been reaped yet.
    pub fn live_pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send a kill request without waiting for the exit.
    pub fn start_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    /// Kill the child and wait for it to be reaped.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

/// Start the process described by `spec`.
///
/// Fails with [`HarnessError::Launch`] if the executable cannot be found,
/// the working directory does not exist, or the OS refuses to spawn it.
pub fn launch(spec: &LaunchSpec) -> Result<ManagedProcess> {
    debug!(service = %spec.name, target = ?spec.target, args = ?spec.args, "launching process");

    let mut child = spec.command().spawn().map_err(|source| HarnessError::Launch {
        name: spec.name.clone(),
        source,
    })?;

    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    info!(service = %spec.name, pid = ?pid, "process launched");

    Ok(ManagedProcess {
        name: spec.name.clone(),
        child,
        pid,
        stdout,
        stderr,
    })
}
