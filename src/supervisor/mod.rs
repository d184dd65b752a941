// src/supervisor/mod.rs

//! Lifecycle supervisor: launch, wait for readiness, serve, stop.
//!
//! Split in two like the rest of the crate's stateful pieces:
//! - [`lifecycle`] is the pure transition table.
//! - [`ServiceSupervisor`] is the async shell that owns the OS process,
//!   its output pumps and the terminator, and reports every observation to
//!   the lifecycle before acting on it.
//!
//! All methods take `&mut self`, so two transitions can never run
//! concurrently for one process. A supervisor runs a single session; build
//! a new one to start the service again.

pub mod lifecycle;

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::errors::{HarnessError, Result};
use crate::process::{
    build_terminator, launch, LineSink, ManagedProcess, OutputPump, OutputTail, ProcessTerminator,
    PumpOutputs, StreamKind, TracingSink,
};
use crate::readiness::Readiness;

pub use lifecycle::{next_state, Lifecycle, LifecycleEvent, ServiceState};

/// How long pumps may keep draining after the process is gone.
const PUMP_JOIN_GRACE: Duration = Duration::from_secs(1);

enum StartOutcome {
    Ready(String),
    TimedOut,
    Exited(io::Result<ExitStatus>),
}

#[derive(Debug)]
pub struct ServiceSupervisor {
    config: ServiceConfig,
    lifecycle: Lifecycle,
    terminator: Box<dyn ProcessTerminator>,
    sink: Arc<dyn LineSink>,
    tail: OutputTail,
    process: Option<ManagedProcess>,
    pumps: Vec<OutputPump>,
    readiness: Option<Readiness>,
}

impl ServiceSupervisor {
    pub fn new(config: ServiceConfig) -> Self {
        let terminator = build_terminator(config.terminator, &config.sweep_names);
        let tail = OutputTail::new(config.tail_lines);
        Self {
            config,
            lifecycle: Lifecycle::new(),
            terminator,
            sink: Arc::new(TracingSink),
            tail,
            process: None,
            pumps: Vec::new(),
            readiness: None,
        }
    }

    /// Replace the default tracing sink for service output.
    pub fn with_sink(mut self, sink: Arc<dyn LineSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    /// PID of the supervised process while the supervisor owns it.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ManagedProcess::pid)
    }

    pub fn readiness(&self) -> Option<&Readiness> {
        self.readiness.as_ref()
    }

    /// Most recent output lines from both streams, oldest first.
    pub fn recent_output(&self) -> Vec<String> {
        self.tail.snapshot()
    }

    /// Launch the service and wait until it is ready.
    ///
    /// Fails with `InvalidTransition` unless the supervisor is `Idle`. On any
    /// other failure the process is gone when this returns and the state is
    /// `Errored`.
    pub async fn start(&mut self) -> Result<Readiness> {
        self.lifecycle.apply(LifecycleEvent::Begin)?;

        let name = self.config.name().to_string();
        info!(service = %name, readiness = %self.config.readiness, "starting service");
        let started = Instant::now();

        let mut process = match launch(&self.config.launch) {
            Ok(process) => process,
            Err(e) => {
                self.lifecycle.apply(LifecycleEvent::LaunchFailed)?;
                error!(service = %name, error = %e, "service failed to launch");
                return Err(e);
            }
        };

        // Subscribe before any pump runs so no early line is missed.
        let (feed_tx, mut feed_rx) = broadcast::channel(self.config.output_buffer);
        let feed = self.config.readiness.needs_output_feed().then_some(feed_tx);
        self.attach_pumps(&name, &mut process, feed);

        self.lifecycle.apply(LifecycleEvent::Launched)?;

        let detector = self.config.readiness.detector(self.config.poll_interval);
        let readiness_timeout = self.config.readiness_timeout;

        let outcome = tokio::select! {
            biased;
            waited = tokio::time::timeout(readiness_timeout, detector.wait_ready(&mut feed_rx)) => {
                match waited {
                    Ok(detail) => StartOutcome::Ready(detail),
                    Err(_) => StartOutcome::TimedOut,
                }
            }
            status = process.wait() => StartOutcome::Exited(status),
        };

        match outcome {
            StartOutcome::Ready(detail) => {
                self.lifecycle.apply(LifecycleEvent::ReadinessConfirmed)?;
                let readiness = Readiness {
                    detail,
                    elapsed: started.elapsed(),
                };
                info!(
                    service = %name,
                    pid = ?process.pid(),
                    elapsed_ms = readiness.elapsed.as_millis() as u64,
                    detail = %readiness.detail,
                    "service ready"
                );
                self.process = Some(process);
                self.readiness = Some(readiness.clone());
                Ok(readiness)
            }
            StartOutcome::TimedOut => {
                warn!(
                    service = %name,
                    timeout_ms = readiness_timeout.as_millis() as u64,
                    "service not ready in time; killing it"
                );
                if let Err(e) = process.kill().await {
                    warn!(service = %name, error = %e, "failed to kill service after readiness timeout");
                }
                self.lifecycle.apply(LifecycleEvent::ReadinessTimedOut)?;
                self.join_pumps().await;
                Err(HarnessError::ReadinessTimeout {
                    name,
                    elapsed: started.elapsed(),
                    last_output: self.tail.snapshot(),
                })
            }
            StartOutcome::Exited(status) => {
                self.lifecycle.apply(LifecycleEvent::ExitedUnexpectedly)?;
                self.join_pumps().await;
                let code = exit_code(&status);
                error!(service = %name, code = ?code, "service exited before becoming ready");
                Err(HarnessError::ServiceExited {
                    name,
                    code,
                    last_output: self.tail.snapshot(),
                })
            }
        }
    }

    /// Check that a ready service is still running.
    ///
    /// An observed exit moves the lifecycle to `Errored`, releases the
    /// process and returns `ServiceExited`. A later `stop` is then a no-op.
    pub async fn check_alive(&mut self) -> Result<()> {
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };

        let status = match process.try_wait()? {
            None => return Ok(()),
            Some(status) => status,
        };

        self.lifecycle.apply(LifecycleEvent::ExitedUnexpectedly)?;
        self.process = None;
        self.join_pumps().await;

        let name = self.config.name().to_string();
        error!(service = %name, %status, "service exited unexpectedly");
        Err(HarnessError::ServiceExited {
            name,
            code: status.code(),
            last_output: self.tail.snapshot(),
        })
    }

    /// Stop the service and wait for it to exit.
    ///
    /// No-op when there is no live process (never started, failed start,
    /// already stopped). Returns `Shutdown` if the process had already died
    /// on its own or had to be force-killed after `stop_timeout`.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut process) = self.process.take() else {
            debug!(service = %self.config.name(), state = %self.state(), "stop: no running process");
            return Ok(());
        };

        let name = self.config.name().to_string();
        let started = Instant::now();

        match process.try_wait() {
            Ok(Some(status)) => {
                self.lifecycle.apply(LifecycleEvent::ExitedUnexpectedly)?;
                self.cleanup().await;
                let reason = format!("process had already exited ({status}) before stop was requested");
                warn!(service = %name, %reason, "stop found service dead");
                return Err(HarnessError::Shutdown { name, reason });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(service = %name, error = %e, "could not poll service status before stop");
            }
        }

        self.lifecycle.apply(LifecycleEvent::StopRequested)?;
        info!(
            service = %name,
            pid = ?process.pid(),
            terminator = self.terminator.name(),
            "stopping service"
        );

        let mut failure = None;

        if let Err(e) = self.terminator.signal(&mut process) {
            warn!(service = %name, error = %e, "termination signal failed; killing");
            failure = Some(format!("termination signal failed: {e}"));
            if let Err(e) = process.start_kill() {
                warn!(service = %name, error = %e, "kill request failed");
            }
        }

        let stop_timeout = self.config.stop_timeout;
        match tokio::time::timeout(stop_timeout, process.wait()).await {
            Ok(Ok(status)) => {
                debug!(service = %name, %status, "service exited");
            }
            Ok(Err(e)) => {
                warn!(service = %name, error = %e, "waiting for service exit failed; killing");
                if let Err(e) = process.kill().await {
                    warn!(service = %name, error = %e, "kill failed");
                }
                failure.get_or_insert_with(|| format!("waiting for exit failed: {e}"));
            }
            Err(_) => {
                warn!(
                    service = %name,
                    timeout_ms = stop_timeout.as_millis() as u64,
                    "service ignored termination; forcing kill"
                );
                if let Err(e) = process.kill().await {
                    warn!(service = %name, error = %e, "kill failed");
                }
                failure = Some(format!(
                    "did not exit within {}ms of the termination signal; force killed",
                    stop_timeout.as_millis()
                ));
            }
        }

        self.lifecycle.apply(LifecycleEvent::ExitConfirmed)?;
        self.cleanup().await;

        match failure {
            None => {
                info!(service = %name, elapsed_ms = started.elapsed().as_millis() as u64, "service stopped");
                Ok(())
            }
            Some(reason) => {
                warn!(service = %name, %reason, "service stopped with errors");
                Err(HarnessError::Shutdown { name, reason })
            }
        }
    }

    fn attach_pumps(
        &mut self,
        name: &str,
        process: &mut ManagedProcess,
        feed: Option<broadcast::Sender<String>>,
    ) {
        let outputs = PumpOutputs {
            sink: Arc::clone(&self.sink),
            tail: self.tail.clone(),
            feed,
        };

        if let Some(stderr) = process.take_stderr() {
            let stderr_outputs = PumpOutputs {
                feed: None,
                ..outputs.clone()
            };
            self.pumps
                .push(OutputPump::spawn(name, StreamKind::Stderr, stderr, stderr_outputs));
        }
        if let Some(stdout) = process.take_stdout() {
            self.pumps
                .push(OutputPump::spawn(name, StreamKind::Stdout, stdout, outputs));
        }
    }

    /// Orphan sweep, then drain the pumps.
    async fn cleanup(&mut self) {
        self.terminator.sweep().await;
        self.join_pumps().await;
    }

    async fn join_pumps(&mut self) {
        for pump in self.pumps.drain(..) {
            let stream = pump.stream();
            if let Some(lines) = pump.join(PUMP_JOIN_GRACE).await {
                debug!(service = %self.config.name(), %stream, lines, "output pump finished");
            }
        }
    }
}

impl Drop for ServiceSupervisor {
    fn drop(&mut self) {
        if let Some(process) = &self.process {
            // kill_on_drop takes care of the process itself.
            warn!(
                service = %self.config.name(),
                pid = ?process.pid(),
                "supervisor dropped while service still running; killing it"
            );
        }
    }
}

fn exit_code(status: &io::Result<ExitStatus>) -> Option<i32> {
    status.as_ref().ok().and_then(ExitStatus::code)
}

/// A started, ready service. Obtained from [`start_service`].
#[derive(Debug)]
pub struct ServiceHandle {
    supervisor: ServiceSupervisor,
    readiness: Readiness,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        self.supervisor.name()
    }

    pub fn state(&self) -> ServiceState {
        self.supervisor.state()
    }

    pub fn pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    /// How readiness was confirmed: the matched log line or the probed port.
    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn recent_output(&self) -> Vec<String> {
        self.supervisor.recent_output()
    }

    pub async fn check_alive(&mut self) -> Result<()> {
        self.supervisor.check_alive().await
    }

    /// Stop without consuming the handle. Stopping twice is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        self.supervisor.stop().await
    }
}

/// Launch the configured service and wait until it is ready.
pub async fn start_service(config: ServiceConfig) -> Result<ServiceHandle> {
    start_service_with_sink(config, Arc::new(TracingSink)).await
}

/// Like [`start_service`], with service output sent to `sink`.
pub async fn start_service_with_sink(
    config: ServiceConfig,
    sink: Arc<dyn LineSink>,
) -> Result<ServiceHandle> {
    let mut supervisor = ServiceSupervisor::new(config).with_sink(sink);
    let readiness = supervisor.start().await?;
    Ok(ServiceHandle {
        supervisor,
        readiness,
    })
}

/// Stop a service started with [`start_service`].
pub async fn stop_service(mut handle: ServiceHandle) -> Result<()> {
    handle.stop().await
}
