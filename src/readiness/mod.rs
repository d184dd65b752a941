// src/readiness/mod.rs

//! Readiness detection.
//!
//! A [`ReadinessSignal`] is the validated, immutable description of how to
//! tell that a service is up. At launch it is turned into a
//! [`ReadinessDetector`] whose single job is to resolve once the signal has
//! been positively observed. Bounding that wait is the caller's job: the
//! supervisor wraps it in `tokio::time::timeout` and races it against the
//! process exiting.
//!
//! Strategies:
//! - [`LogScan`]: match stdout lines against a regex. Recommended.
//! - [`PortProbe`]: poll a socket address. It cannot tell the supervised
//!   service apart from an unrelated process holding the same port, so a
//!   stale listener makes it report ready too early.

pub mod log_scan;
pub mod port;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use regex::Regex;
use tokio::sync::broadcast;

use crate::types::ProbeMethod;

pub use log_scan::LogScan;
pub use port::{bind_probe_says_ready, connect_probe_says_ready, PortProbe};

/// How readiness is observed for one service.
#[derive(Debug, Clone)]
pub enum ReadinessSignal {
    Port {
        address: SocketAddr,
        probe: ProbeMethod,
    },
    LogPattern {
        pattern: Regex,
    },
}

impl ReadinessSignal {
    /// Build the detector for one launch.
    pub fn detector(&self, poll_interval: Duration) -> Box<dyn ReadinessDetector> {
        match self {
            ReadinessSignal::Port { address, probe } => {
                Box::new(PortProbe::new(*address, *probe, poll_interval))
            }
            ReadinessSignal::LogPattern { pattern } => Box::new(LogScan::new(pattern.clone())),
        }
    }

    /// Whether the detector consumes the stdout line feed.
    pub fn needs_output_feed(&self) -> bool {
        matches!(self, ReadinessSignal::LogPattern { .. })
    }
}

impl fmt::Display for ReadinessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessSignal::Port { address, probe } => {
                write!(f, "port {address} ({})", probe_name(*probe))
            }
            ReadinessSignal::LogPattern { pattern } => write!(f, "log /{}/", pattern.as_str()),
        }
    }
}

fn probe_name(probe: ProbeMethod) -> &'static str {
    match probe {
        ProbeMethod::Connect => "connect",
        ProbeMethod::Bind => "bind",
    }
}

/// Waits until a readiness signal is observed.
///
/// `wait_ready` never gives up on its own; it resolves with a short
/// human-readable detail (the matched line, or the probed address) once
/// the signal is confirmed.
pub trait ReadinessDetector: Send + Sync + fmt::Debug {
    fn wait_ready<'a>(
        &'a self,
        lines: &'a mut broadcast::Receiver<String>,
    ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>>;
}

/// Outcome of a successful readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// The matched output line, or a description of the probe that succeeded.
    pub detail: String,
    /// Time from launch to confirmation.
    pub elapsed: Duration,
}
