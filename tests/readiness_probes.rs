// tests/readiness_probes.rs
//
// Readiness strategies against the `emu-devnet` fixture.

mod common;
use crate::common::builders::ServiceConfigBuilder;
use crate::common::{free_port, init_tracing, teardown, with_timeout_secs};

use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use emuharness::devnet::{call, Request, Response};
use emuharness::errors::HarnessError;
use emuharness::supervisor::{start_service, ServiceState};
use emuharness::types::ProbeMethod;

type TestResult = Result<(), Box<dyn Error>>;

const DEVNET: &str = env!("CARGO_BIN_EXE_emu-devnet");

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

async fn probe_until_ready(probe: ProbeMethod) -> TestResult {
    init_tracing();
    let port = free_port();
    let port_arg = port.to_string();
    let cfg = ServiceConfigBuilder::port("devnet-probe", DEVNET, loopback(port), probe)
        .args(["--port", port_arg.as_str(), "--startup-delay-ms", "300"])
        .build();

    let handle = start_service(cfg).await?;
    assert_eq!(handle.state(), ServiceState::Ready);
    assert!(handle.readiness().elapsed >= Duration::from_millis(300));

    // Ready means the listener really accepts requests.
    let pong = call(&loopback(port).to_string(), &Request::Ping).await?;
    assert_eq!(pong, Response::Pong);

    teardown(handle).await;
    Ok(())
}

#[tokio::test]
async fn connect_probe_waits_for_listener() -> TestResult {
    with_timeout_secs(20, probe_until_ready(ProbeMethod::Connect)).await
}

#[tokio::test]
async fn bind_probe_waits_for_listener() -> TestResult {
    with_timeout_secs(20, probe_until_ready(ProbeMethod::Bind)).await
}

#[tokio::test]
async fn port_probe_times_out_when_nothing_listens() {
    init_tracing();
    let port = free_port();
    let port_arg = port.to_string();
    let cfg = ServiceConfigBuilder::port("devnet-slow", DEVNET, loopback(port), ProbeMethod::Connect)
        .args(["--port", port_arg.as_str(), "--startup-delay-ms", "10000"])
        .readiness_timeout("400ms")
        .build();

    let err = with_timeout_secs(10, start_service(cfg)).await.unwrap_err();
    assert!(matches!(err, HarnessError::ReadinessTimeout { .. }));
}

#[tokio::test]
async fn log_scan_reports_the_matched_line() -> TestResult {
    init_tracing();
    let cfg = ServiceConfigBuilder::log("devnet-log", DEVNET, r"^Started gRPC server on \S+$")
        .args(["--port", "0"])
        .build();

    let handle = with_timeout_secs(20, start_service(cfg)).await?;
    let detail = handle.readiness().detail.clone();
    let address: SocketAddr = detail
        .rsplit(' ')
        .next()
        .ok_or("no address in readiness line")?
        .parse()?;
    assert_ne!(address.port(), 0);
    assert_eq!(call(&address.to_string(), &Request::Ping).await?, Response::Pong);

    teardown(handle).await;
    Ok(())
}
