// src/process/terminator.rs

//! Platform-specific process termination.
//!
//! The supervisor only talks to a [`ProcessTerminator`]; which variant it
//! gets is decided once, from configuration:
//!
//! - [`GracefulSignal`]: SIGTERM on unix. Where no such signal exists the
//!   forced kill is substituted.
//! - [`ForcedKill`]: kill the child immediately.
//! - [`ForcedKillWithSweep`]: forced kill, then a best-effort sweep that
//!   terminates leftover processes by image name. Some process trees (notably
//!   on Windows) are not reaped by killing the parent alone.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::process::ManagedProcess;
use crate::types::TerminatorKind;

pub trait ProcessTerminator: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Ask the process to terminate. Does not wait for the exit.
    fn signal(&self, process: &mut ManagedProcess) -> io::Result<()>;

    /// Clean up after the process has exited. Failures are logged, never
    /// returned.
    fn sweep(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GracefulSignal;

impl ProcessTerminator for GracefulSignal {
    fn name(&self) -> &'static str {
        "graceful"
    }

    fn signal(&self, process: &mut ManagedProcess) -> io::Result<()> {
        let Some(pid) = process.live_pid() else {
            debug!(service = %process.name(), "process already reaped; nothing to signal");
            return Ok(());
        };
        send_terminate(process, pid)
    }
}

#[cfg(unix)]
fn send_terminate(process: &mut ManagedProcess, pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    debug!(service = %process.name(), pid, "sending SIGTERM");
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        // Exited between the pid lookup and the signal.
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(not(unix))]
fn send_terminate(process: &mut ManagedProcess, pid: u32) -> io::Result<()> {
    debug!(
        service = %process.name(),
        pid,
        "graceful termination signal unsupported on this platform; killing"
    );
    process.start_kill()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedKill;

impl ProcessTerminator for ForcedKill {
    fn name(&self) -> &'static str {
        "forced"
    }

    fn signal(&self, process: &mut ManagedProcess) -> io::Result<()> {
        debug!(service = %process.name(), pid = ?process.live_pid(), "killing process");
        process.start_kill()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForcedKillWithSweep {
    names: Vec<String>,
}

impl ForcedKillWithSweep {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl ProcessTerminator for ForcedKillWithSweep {
    fn name(&self) -> &'static str {
        "sweep"
    }

    fn signal(&self, process: &mut ManagedProcess) -> io::Result<()> {
        ForcedKill.signal(process)
    }

    fn sweep(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            for name in &self.names {
                sweep_by_name(name).await;
            }
        })
    }
}

/// Terminate every process whose image name is `name`.
///
/// Uses `taskkill /F /T /IM` on Windows and `pkill -x` elsewhere. Note that
/// `pkill` matches the kernel's process name, which Linux truncates to 15
/// characters.
async fn sweep_by_name(name: &str) {
    let mut cmd = if cfg!(windows) {
        let image = if name.to_lowercase().ends_with(".exe") {
            name.to_string()
        } else {
            format!("{name}.exe")
        };
        let mut c = Command::new("taskkill");
        c.args(["/F", "/T", "/IM"]).arg(image);
        c
    } else {
        let mut c = Command::new("pkill");
        c.arg("-x").arg(name);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match cmd.status().await {
        Ok(status) if status.success() => {
            info!(process_name = %name, "terminated orphaned processes");
        }
        Ok(status) => {
            // pkill exits 1 and taskkill 128 when nothing matched.
            debug!(process_name = %name, code = ?status.code(), "orphan sweep matched nothing or failed");
        }
        Err(e) => {
            warn!(process_name = %name, error = %e, "orphan sweep could not run");
        }
    }
}

/// Resolve `auto` to the concrete strategy for this platform.
pub fn resolve_kind(kind: TerminatorKind) -> TerminatorKind {
    match kind {
        TerminatorKind::Auto if cfg!(windows) => TerminatorKind::Sweep,
        TerminatorKind::Auto => TerminatorKind::Graceful,
        other => other,
    }
}

pub fn build_terminator(kind: TerminatorKind, sweep_names: &[String]) -> Box<dyn ProcessTerminator> {
    match resolve_kind(kind) {
        TerminatorKind::Graceful | TerminatorKind::Auto => Box::new(GracefulSignal),
        TerminatorKind::Forced => Box::new(ForcedKill),
        TerminatorKind::Sweep => Box::new(ForcedKillWithSweep::new(sweep_names.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_resolves_per_platform() {
        let resolved = resolve_kind(TerminatorKind::Auto);
        if cfg!(windows) {
            assert_eq!(resolved, TerminatorKind::Sweep);
        } else {
            assert_eq!(resolved, TerminatorKind::Graceful);
        }
        assert_eq!(resolve_kind(TerminatorKind::Forced), TerminatorKind::Forced);
    }

    #[test]
    fn builds_matching_variant() {
        let names = vec!["emu-devnet".to_string()];
        assert_eq!(build_terminator(TerminatorKind::Forced, &names).name(), "forced");
        assert_eq!(build_terminator(TerminatorKind::Sweep, &names).name(), "sweep");
        assert_eq!(build_terminator(TerminatorKind::Graceful, &names).name(), "graceful");
    }

    #[tokio::test]
    async fn sweep_of_unknown_name_is_harmless() {
        let terminator = ForcedKillWithSweep::new(vec!["emuharness-no-such-proc".to_string()]);
        tokio::time::timeout(std::time::Duration::from_secs(10), terminator.sweep())
            .await
            .expect("sweep must not hang");
    }
}
