// src/readiness/log_scan.rs

use std::future::Future;
use std::pin::Pin;

use regex::Regex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::ReadinessDetector;

/// Waits for the first stdout line matching `pattern`.
///
/// Lines are read from the pump's broadcast feed, so the pump keeps
/// draining the pipe on its own; the scan only observes.
#[derive(Debug, Clone)]
pub struct LogScan {
    pattern: Regex,
}

impl LogScan {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl ReadinessDetector for LogScan {
    fn wait_ready<'a>(
        &'a self,
        lines: &'a mut broadcast::Receiver<String>,
    ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        Box::pin(async move {
            loop {
                match lines.recv().await {
                    Ok(line) => {
                        if self.pattern.is_match(&line) {
                            debug!(pattern = %self.pattern, line = %line, "readiness line matched");
                            return line;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "readiness scan fell behind the output feed; some lines were not inspected");
                    }
                    Err(RecvError::Closed) => {
                        // Output closed without a match. The exit watch or the
                        // timeout decides what happens next.
                        debug!(pattern = %self.pattern, "output feed closed before readiness line");
                        std::future::pending::<()>().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn returns_first_matching_line() {
        let (tx, mut rx) = broadcast::channel(16);
        let scan = LogScan::new(Regex::new(r"server started on (\S+)").unwrap());

        tx.send("booting".to_string()).unwrap();
        tx.send("server started on 127.0.0.1:9000".to_string()).unwrap();
        tx.send("server started on later".to_string()).unwrap();

        let line = scan.wait_ready(&mut rx).await;
        assert_eq!(line, "server started on 127.0.0.1:9000");
    }

    #[tokio::test]
    async fn closed_feed_without_match_keeps_waiting() {
        let (tx, mut rx) = broadcast::channel::<String>(4);
        let scan = LogScan::new(Regex::new("ready").unwrap());
        tx.send("nope".to_string()).unwrap();
        drop(tx);

        let outcome =
            tokio::time::timeout(Duration::from_millis(100), scan.wait_ready(&mut rx)).await;
        assert!(outcome.is_err());
    }
}
