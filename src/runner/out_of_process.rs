// src/runner/out_of_process.rs

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Invocation;
use crate::config::SubjectConfig;
use crate::errors::{HarnessError, Result};

/// Stand-in deadline for timeouts too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Spawn a fresh subject process, drain both pipes concurrently and wait
/// for it, bounded by `subject.timeout`.
pub(crate) async fn run(
    config: &SubjectConfig,
    invocation: &Invocation,
) -> Result<(String, String, Option<i32>)> {
    let program = config.program.as_ref().ok_or_else(|| {
        HarnessError::ConfigError(
            "[subject].program is required to run commands out of process".to_string(),
        )
    })?;

    let mut cmd = Command::new(program);
    cmd.args(&invocation.argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }

    let started = Instant::now();
    // One deadline covers the exit and both drains: a grandchild can keep a
    // pipe open after the subject itself has exited.
    let now = tokio::time::Instant::now();
    let deadline = now.checked_add(config.timeout).unwrap_or(now + FAR_FUTURE);
    let mut child = cmd.spawn().map_err(|source| HarnessError::Launch {
        name: program.display().to_string(),
        source,
    })?;

    let mut stdout = drain(child.stdout.take());
    let mut stderr = drain(child.stderr.take());

    let status = match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(program = %program.display(), error = %e, "failed to kill timed-out command");
            }
            stdout.abort();
            stderr.abort();
            return Err(timed_out(invocation, started));
        }
    };

    let drained = tokio::time::timeout_at(deadline, async {
        (collect(&mut stdout).await, collect(&mut stderr).await)
    })
    .await;

    let (stdout, stderr) = match drained {
        Ok(output) => output,
        Err(_) => {
            warn!(
                program = %program.display(),
                code = ?status.code(),
                "command exited but its output is still held open; giving up"
            );
            stdout.abort();
            stderr.abort();
            return Err(timed_out(invocation, started));
        }
    };

    debug!(
        args = ?invocation.args,
        code = ?status.code(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "out-of-process command finished"
    );

    Ok((stdout, stderr, status.code()))
}

fn timed_out(invocation: &Invocation, started: Instant) -> HarnessError {
    HarnessError::CommandTimedOut {
        args: invocation.args.clone(),
        elapsed: started.elapsed(),
    }
}

fn drain<R>(reader: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(e) = reader.read_to_end(&mut buf).await {
                warn!(error = %e, "error reading command output");
            }
        }
        buf
    })
}

async fn collect(handle: &mut JoinHandle<Vec<u8>>) -> String {
    match handle.await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(error = %e, "command output reader failed");
            String::new()
        }
    }
}
