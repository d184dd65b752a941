// tests/e2e_devnet.rs
//
// Full session: start the devnet, drive the `emu` subject against it,
// stop the devnet. Runs in both execution modes.

mod common;
use crate::common::builders::{ServiceConfigBuilder, SubjectConfigBuilder};
use crate::common::{init_tracing, with_timeout_secs};

use std::error::Error;

use emuharness::devnet::SERVICE_ACCOUNT;
use emuharness::errors::HarnessError;
use emuharness::extract::is_well_formed_address;
use emuharness::runner::CommandRunner;
use emuharness::supervisor::{start_service, stop_service, ServiceHandle};
use emuharness::types::{OutputFormat, RunMode};

type TestResult = Result<(), Box<dyn Error>>;

async fn start_devnet() -> Result<(ServiceHandle, String), Box<dyn Error>> {
    let cfg = ServiceConfigBuilder::log(
        "devnet-e2e",
        env!("CARGO_BIN_EXE_emu-devnet"),
        r"Started gRPC server on \S+",
    )
    .args(["--port", "0"])
    .build();

    let handle = start_service(cfg).await?;
    let host = handle
        .readiness()
        .detail
        .rsplit(' ')
        .next()
        .ok_or("no address in readiness line")?
        .to_string();
    Ok((handle, host))
}

fn subject_runner(mode: RunMode, dir: &tempfile::TempDir) -> CommandRunner {
    let subject = SubjectConfigBuilder::new()
        .program(env!("CARGO_BIN_EXE_emu"))
        .config_file(dir.path().join("emu.toml"))
        .mode(mode)
        .timeout("10s")
        .build();
    CommandRunner::new(subject)
}

/// Runner whose `emu.toml` in `dir` points at `host`.
async fn runner_for(
    host: &str,
    mode: RunMode,
    dir: &tempfile::TempDir,
) -> Result<CommandRunner, Box<dyn Error>> {
    let runner = subject_runner(mode, dir);
    runner.run(["init", "--host", host]).await?;
    Ok(runner)
}

async fn account_round_trip(mode: RunMode) -> TestResult {
    init_tracing();
    let (handle, host) = start_devnet().await?;
    let dir = tempfile::tempdir()?;
    let runner = runner_for(&host, mode, &dir).await?;

    let created = runner.run(["accounts", "create", "-o", "json"]).await?;
    let created = created.parse(OutputFormat::Json)?;
    assert!(is_well_formed_address(&created.address), "{created:?}");

    let fetched = runner.run(["accounts", "get", created.address.as_str()]).await?;
    assert_eq!(fetched.parse(OutputFormat::Text)?.address, created.address);

    stop_service(handle).await?;
    Ok(())
}

#[tokio::test]
async fn account_round_trip_out_of_process() -> TestResult {
    with_timeout_secs(20, account_round_trip(RunMode::OutOfProcess)).await
}

#[tokio::test]
async fn account_round_trip_in_process() -> TestResult {
    with_timeout_secs(20, account_round_trip(RunMode::InProcess)).await
}

async fn flags_isolated() -> TestResult {
    init_tracing();
    let (handle, host) = start_devnet().await?;
    let dir = tempfile::tempdir()?;
    let runner = runner_for(&host, RunMode::InProcess, &dir).await?;

    let json = runner.run(["accounts", "get", SERVICE_ACCOUNT, "-o", "json"]).await?;
    assert!(json.stdout.trim_start().starts_with('{'));

    let text = runner.run(["accounts", "get", SERVICE_ACCOUNT]).await?;
    assert!(text.stdout.starts_with("Address"));
    assert_eq!(text.parse(OutputFormat::Text)?.address, SERVICE_ACCOUNT);

    stop_service(handle).await?;
    Ok(())
}

#[tokio::test]
async fn in_process_invocations_do_not_share_flags() -> TestResult {
    with_timeout_secs(20, flags_isolated()).await
}

async fn failing_command(mode: RunMode) -> TestResult {
    init_tracing();
    let (handle, host) = start_devnet().await?;
    let dir = tempfile::tempdir()?;
    let runner = runner_for(&host, mode, &dir).await?;

    let err = runner.run(["accounts", "get", "0xdeadbeef"]).await.unwrap_err();
    match err {
        HarnessError::Command {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, Some(1));
            assert!(stderr.contains("not found"), "{stderr}");
        }
        other => panic!("expected command error, got {other:?}"),
    }

    stop_service(handle).await?;
    Ok(())
}

#[tokio::test]
async fn failing_command_out_of_process() -> TestResult {
    with_timeout_secs(20, failing_command(RunMode::OutOfProcess)).await
}

#[tokio::test]
async fn failing_command_in_process() -> TestResult {
    with_timeout_secs(20, failing_command(RunMode::InProcess)).await
}

#[tokio::test]
async fn init_twice_reports_existing_configuration() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let runner = with_timeout_secs(20, runner_for("127.0.0.1:3570", RunMode::OutOfProcess, &dir)).await?;

    let err = with_timeout_secs(20, runner.run(["init"])).await.unwrap_err();
    match err {
        HarnessError::Command { stderr, .. } => {
            assert!(stderr.contains("configuration already exists"), "{stderr}")
        }
        other => panic!("expected command error, got {other:?}"),
    }
    Ok(())
}
