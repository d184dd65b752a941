// src/runner/in_process.rs

use std::io::Write;
use std::time::Instant;

use tracing::debug;

use super::{CapturedIo, CommandDispatcher, Invocation};
use crate::config::SubjectConfig;
use crate::errors::{HarnessError, Result};

/// Exit code reported for a dispatcher error, matching the `emu` binary.
const FAILURE_EXIT_CODE: i32 = 1;

/// Run the invocation through `dispatcher` with output captured in memory.
///
/// `subject.cwd` does not apply here: the harness process has a single
/// working directory, so paths passed in-process should be absolute.
pub(crate) async fn run(
    dispatcher: &dyn CommandDispatcher,
    config: &SubjectConfig,
    invocation: &Invocation,
) -> Result<(String, String, Option<i32>)> {
    let started = Instant::now();
    let mut io = CapturedIo::default();

    let outcome =
        tokio::time::timeout(config.timeout, dispatcher.dispatch(invocation.argv.clone(), &mut io))
            .await;

    let exit_code = match outcome {
        Err(_) => {
            return Err(HarnessError::CommandTimedOut {
                args: invocation.args.clone(),
                elapsed: started.elapsed(),
            });
        }
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            writeln!(io.err, "Error: {e:#}")?;
            FAILURE_EXIT_CODE
        }
    };

    debug!(
        args = ?invocation.args,
        exit_code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "in-process command finished"
    );

    Ok((
        String::from_utf8_lossy(&io.out).into_owned(),
        String::from_utf8_lossy(&io.err).into_owned(),
        Some(exit_code),
    ))
}
