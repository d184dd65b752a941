// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use emuharness::config::{load_and_validate, load_from_path};
use emuharness::errors::HarnessError;
use emuharness::process::LaunchTarget;
use emuharness::readiness::ReadinessSignal;
use emuharness::types::{ProbeMethod, RunMode, TerminatorKind};

type TestResult = Result<(), Box<dyn Error>>;

const FULL: &str = r#"
[service]
name = "emu-devnet"
program = "bin/emu-devnet"
args = ["--port", "3570"]
cwd = "work"
readiness = { kind = "port", address = ":3570", probe = "bind" }
readiness_timeout = "2s"
poll_interval = "20ms"
stop_timeout = "1s"
terminator = "forced"

[service.env]
EMU_LOG = "debug"

[subject]
program = "emu"
config_file = "testdata/emu.toml"
mode = "in_process"
timeout = "15s"
"#;

#[test]
fn loads_full_config_and_rebases_relative_paths() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Emuharness.toml");
    fs::write(&path, FULL)?;

    let cfg = load_and_validate(&path)?;
    let service = &cfg.service;

    assert_eq!(service.name(), "emu-devnet");
    assert_eq!(
        service.launch.target,
        LaunchTarget::Program(dir.path().join("bin/emu-devnet"))
    );
    assert_eq!(service.launch.cwd, Some(dir.path().join("work")));
    assert_eq!(service.launch.env.get("EMU_LOG").map(String::as_str), Some("debug"));
    assert_eq!(service.readiness_timeout, Duration::from_secs(2));
    assert_eq!(service.poll_interval, Duration::from_millis(20));
    assert_eq!(service.stop_timeout, Duration::from_secs(1));
    assert_eq!(service.terminator, TerminatorKind::Forced);
    assert!(matches!(
        service.readiness,
        ReadinessSignal::Port {
            probe: ProbeMethod::Bind,
            ..
        }
    ));

    let subject = &cfg.subject;
    // Bare program names stay as they are, to be found on PATH.
    assert_eq!(subject.program, Some(PathBuf::from("emu")));
    assert_eq!(subject.config_file, Some(dir.path().join("testdata/emu.toml")));
    assert_eq!(subject.mode, RunMode::InProcess);
    assert_eq!(subject.timeout, Duration::from_secs(15));
    Ok(())
}

#[test]
fn subject_section_is_optional() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Emuharness.toml");
    fs::write(
        &path,
        r#"
[service]
name = "devnet"
cargo_bin = "emu-devnet"
readiness = { kind = "log", pattern = "Started gRPC server" }
"#,
    )?;

    let cfg = load_and_validate(&path)?;
    assert!(matches!(
        cfg.service.launch.target,
        LaunchTarget::CargoBin { ref bin, manifest_path: None } if bin == "emu-devnet"
    ));
    assert_eq!(cfg.subject.mode, RunMode::OutOfProcess);
    assert_eq!(cfg.subject.timeout, Duration::from_secs(30));
    Ok(())
}

#[test]
fn unknown_readiness_kind_is_a_toml_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
[service]
name = "devnet"
program = "emu-devnet"
readiness = { kind = "telepathy" }
"#,
    )?;

    assert!(matches!(load_from_path(&path), Err(HarnessError::TomlError(_))));
    Ok(())
}

#[test]
fn validation_errors_name_the_problem() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
[service]
name = "devnet"
program = "emu-devnet"
readiness = { kind = "port", address = "not-an-address" }
"#,
    )?;

    match load_and_validate(&path) {
        Err(HarnessError::ConfigError(msg)) => assert!(msg.contains("not-an-address"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/nonexistent/Emuharness.toml").unwrap_err();
    assert!(matches!(err, HarnessError::IoError(_)));
}
