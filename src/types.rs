use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Output format selected on the subject command line (`-o`).
///
/// - `Text`: human-readable `Label\t value` lines (default).
/// - `Json`: a single JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "invalid output format: {other} (expected \"text\" or \"json\")"
            )),
        }
    }
}

/// How the subject command is executed by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Fresh OS process per invocation.
    #[default]
    OutOfProcess,
    /// Fresh command tree inside the harness process; output captured in
    /// memory. Faster, but without process isolation.
    InProcess,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "out_of_process" => Ok(RunMode::OutOfProcess),
            "in_process" => Ok(RunMode::InProcess),
            other => Err(format!(
                "invalid run mode: {other} (expected \"in_process\" or \"out_of_process\")"
            )),
        }
    }
}

/// How the port-probe readiness strategy interprets a probe attempt.
///
/// The two polarities are deliberately opposite:
/// - `Bind`: binding the address *fails* once the service listens on it.
/// - `Connect`: connecting to the address *succeeds* once it listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    #[default]
    Connect,
    Bind,
}

/// Which termination strategy the supervisor uses on stop.
///
/// `Auto` is resolved once during config validation; see
/// [`crate::process::terminator::resolve_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TerminatorKind {
    #[default]
    Auto,
    Graceful,
    Forced,
    Sweep,
}
