// src/readiness/port.rs

use std::future::Future;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::pin::Pin;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use super::ReadinessDetector;
use crate::types::ProbeMethod;

const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Polls a socket address at a fixed interval.
#[derive(Debug, Clone)]
pub struct PortProbe {
    address: SocketAddr,
    probe: ProbeMethod,
    interval: Duration,
}

impl PortProbe {
    pub fn new(address: SocketAddr, probe: ProbeMethod, interval: Duration) -> Self {
        Self {
            address,
            probe,
            interval,
        }
    }

    async fn probe_once(&self) -> bool {
        match self.probe {
            ProbeMethod::Bind => bind_probe_says_ready(self.address),
            ProbeMethod::Connect => connect_probe_says_ready(self.address).await,
        }
    }
}

impl ReadinessDetector for PortProbe {
    fn wait_ready<'a>(
        &'a self,
        _lines: &'a mut broadcast::Receiver<String>,
    ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        Box::pin(async move {
            let mut attempts = 0u64;
            loop {
                attempts += 1;
                if self.probe_once().await {
                    debug!(address = %self.address, probe = ?self.probe, attempts, "port probe confirmed listener");
                    return format!("listener on {}", self.address);
                }
                tokio::time::sleep(self.interval).await;
            }
        })
    }
}

/// Bind polarity: ready when the address can NOT be bound.
///
/// A successful bind means nobody listens yet; the probe socket is dropped
/// immediately so the service can still take the port. Bind errors other
/// than "address in use" are also read as "held" and logged.
pub fn bind_probe_says_ready(address: SocketAddr) -> bool {
    match TcpListener::bind(address) {
        Ok(listener) => {
            drop(listener);
            trace!(%address, "bind probe succeeded; not listening yet");
            false
        }
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => true,
        Err(e) => {
            warn!(%address, error = %e, "bind probe failed for a reason other than address-in-use; treating as ready");
            true
        }
    }
}

/// Connect polarity: ready when a TCP connection is accepted.
pub async fn connect_probe_says_ready(address: SocketAddr) -> bool {
    match tokio::time::timeout(CONNECT_ATTEMPT_TIMEOUT, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            trace!(%address, error = %e, "connect probe refused");
            false
        }
        Err(_) => {
            trace!(%address, "connect probe timed out");
            false
        }
    }
}
