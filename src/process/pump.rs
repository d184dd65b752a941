// src/process/pump.rs

//! Output pump: one Tokio task per child output stream.
//!
//! The pump keeps the child's pipe drained for the lifetime of the process so
//! the child can never block on a full pipe. Every line is:
//! - forwarded to a [`LineSink`] (tracing by default),
//! - recorded in a bounded [`OutputTail`] used for error diagnostics,
//! - published on an optional `broadcast` feed (log-scan readiness).
//!
//! No backpressure reaches the child: `broadcast::Sender::send` never waits,
//! slow subscribers lag instead.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which output stream a pump is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Destination for pumped lines.
pub trait LineSink: Send + Sync + fmt::Debug {
    fn line(&self, source: &str, stream: StreamKind, line: &str);
}

/// Republishes service output through `tracing`: stdout at `info`, stderr
/// at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn line(&self, source: &str, stream: StreamKind, line: &str) {
        match stream {
            StreamKind::Stdout => info!(target: "emuharness::service", service = %source, "{}", line),
            StreamKind::Stderr => warn!(target: "emuharness::service", service = %source, "{}", line),
        }
    }
}

/// Bounded ring of the most recent output lines, shared between pumps.
#[derive(Debug, Clone)]
pub struct OutputTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl OutputTail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: &str) {
        let mut guard = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(line.to_string());
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        let guard = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        guard.iter().cloned().collect()
    }
}

/// Where a pump publishes the lines it reads.
#[derive(Debug, Clone)]
pub struct PumpOutputs {
    pub sink: Arc<dyn LineSink>,
    pub tail: OutputTail,
    pub feed: Option<broadcast::Sender<String>>,
}

/// Handle to a running pump task.
#[derive(Debug)]
pub struct OutputPump {
    source: String,
    stream: StreamKind,
    handle: JoinHandle<u64>,
}

impl OutputPump {
    /// Spawn a pump draining `reader` until EOF or a read error.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<R>(source: &str, stream: StreamKind, reader: R, outputs: PumpOutputs) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let task_source = source.to_string();
        let handle = tokio::spawn(pump_lines(task_source, stream, reader, outputs));

        Self {
            source: source.to_string(),
            stream,
            handle,
        }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the pump to reach EOF, at most `grace`.
    ///
    /// Returns the number of lines pumped, or `None` if the pump had to be
    /// aborted. Abort happens when something other than the stopped process
    /// (typically an orphaned grandchild) still holds the write end of the
    /// pipe; the lines it writes afterwards are dropped.
    pub async fn join(mut self, grace: Duration) -> Option<u64> {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(lines)) => Some(lines),
            Ok(Err(e)) => {
                warn!(service = %self.source, stream = %self.stream, error = %e, "output pump task failed");
                None
            }
            Err(_) => {
                warn!(
                    service = %self.source,
                    stream = %self.stream,
                    grace_ms = grace.as_millis() as u64,
                    "output stream still open after process exit; aborting pump"
                );
                self.handle.abort();
                None
            }
        }
    }
}

async fn pump_lines<R>(source: String, stream: StreamKind, reader: R, outputs: PumpOutputs) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0u64;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(service = %source, %stream, lines = count, "output stream closed");
                break;
            }
            Ok(_) => {
                let line = decode_line(&buf);
                outputs.sink.line(&source, stream, &line);
                outputs.tail.push(&line);
                if let Some(feed) = &outputs.feed {
                    // Err only means nobody is subscribed any more.
                    let _ = feed.send(line);
                }
                count += 1;
            }
            Err(e) => {
                warn!(service = %source, %stream, error = %e, "error reading output stream; pump exiting");
                break;
            }
        }
    }

    count
}

/// Strip the line terminator and decode lossily, so a partial final line or
/// non-UTF-8 output never stops the pump.
fn decode_line(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
