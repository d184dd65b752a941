pub mod builders;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use emuharness::supervisor::ServiceHandle;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout_secs(5, f).await
}

/// Run a future with a timeout of `secs` seconds.
pub async fn with_timeout_secs<F, T>(secs: u64, f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(secs), f)
        .await
        .unwrap_or_else(|_| panic!("Test timed out after {secs} seconds"))
}

/// A TCP port on loopback that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// Stop a service at the end of a test. Shutdown trouble is logged, not
/// fatal: the test's own assertions decide the outcome.
pub async fn teardown(mut handle: ServiceHandle) {
    if let Err(e) = handle.stop().await {
        tracing::warn!(service = %handle.name(), error = %e, "teardown: service did not stop cleanly");
    }
}
