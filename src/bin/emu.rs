// src/bin/emu.rs

use std::io::Write;
use std::process::ExitCode;

use emuharness::logging;
use emuharness::runner::CapturedIo;
use emuharness::subject::run_subject;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init_logging(None) {
        eprintln!("emu: {e:#}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut io = CapturedIo::default();
    let outcome = run_subject(args, &mut io).await;

    // Best effort: a closed stdout must not hide the exit status.
    let _ = std::io::stdout().write_all(&io.out);
    let _ = std::io::stderr().write_all(&io.err);

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
