// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::process::LaunchSpec;
use crate::readiness::ReadinessSignal;
use crate::types::{ProbeMethod, RunMode, TerminatorKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [service]
/// name = "emu-devnet"
/// cargo_bin = "emu-devnet"
/// args = ["--port", "3570"]
/// readiness = { kind = "log", pattern = "Started gRPC server" }
/// readiness_timeout = "10s"
///
/// [subject]
/// program = "target/debug/emu"
/// config_file = "testdata/emu.toml"
/// mode = "in_process"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawHarnessConfig {
    pub service: RawServiceConfig,

    #[serde(default)]
    pub subject: RawSubjectConfig,
}

/// `[service]` section: the long-running process under supervision.
#[derive(Debug, Clone, Deserialize)]
pub struct RawServiceConfig {
    /// Logical name, used in logs and as the default orphan-sweep name.
    pub name: String,

    /// Executable to run. Exactly one of `program` / `cargo_bin` is required.
    #[serde(default)]
    pub program: Option<String>,

    /// Build and run a binary from source via `cargo run --bin`.
    #[serde(default)]
    pub cargo_bin: Option<String>,

    /// Optional `--manifest-path` for `cargo_bin`.
    #[serde(default)]
    pub manifest_path: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    pub readiness: RawReadiness,

    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout: String,

    /// Port-probe polling interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Upper bound on waiting for exit after the termination signal.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,

    #[serde(default)]
    pub terminator: TerminatorKind,

    /// Process image names for the orphan sweep. Defaults to `[name]`.
    #[serde(default)]
    pub sweep_names: Option<Vec<String>>,

    /// Capacity of the stdout line feed used by log-scan readiness.
    #[serde(default = "default_output_buffer")]
    pub output_buffer: usize,

    /// Number of recent output lines kept for error diagnostics.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

/// Readiness strategy as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawReadiness {
    Port {
        address: String,
        #[serde(default)]
        probe: ProbeMethod,
    },
    Log {
        pattern: String,
    },
}

/// `[subject]` section: the command under test.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSubjectConfig {
    /// Executable for out-of-process mode.
    #[serde(default)]
    pub program: Option<String>,

    /// Passed to every invocation as `-f <config_file>`.
    #[serde(default)]
    pub config_file: Option<String>,

    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub mode: RunMode,

    #[serde(default = "default_command_timeout")]
    pub timeout: String,
}

fn default_readiness_timeout() -> String {
    "10s".to_string()
}

fn default_poll_interval() -> String {
    "50ms".to_string()
}

fn default_stop_timeout() -> String {
    "5s".to_string()
}

fn default_command_timeout() -> String {
    "30s".to_string()
}

fn default_output_buffer() -> usize {
    256
}

fn default_tail_lines() -> usize {
    20
}

impl RawServiceConfig {
    /// A raw service section with every optional field at its default.
    pub fn new(name: impl Into<String>, readiness: RawReadiness) -> Self {
        Self {
            name: name.into(),
            program: None,
            cargo_bin: None,
            manifest_path: None,
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            readiness,
            readiness_timeout: default_readiness_timeout(),
            poll_interval: default_poll_interval(),
            stop_timeout: default_stop_timeout(),
            terminator: TerminatorKind::default(),
            sweep_names: None,
            output_buffer: default_output_buffer(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl Default for RawSubjectConfig {
    fn default() -> Self {
        Self {
            program: None,
            config_file: None,
            cwd: None,
            mode: RunMode::default(),
            timeout: default_command_timeout(),
        }
    }
}

/// Validated harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub service: ServiceConfig,
    pub subject: SubjectConfig,
}

/// Validated `[service]` section.
///
/// Durations are parsed, the readiness pattern is compiled and
/// `terminator` is never [`TerminatorKind::Auto`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub launch: LaunchSpec,
    pub readiness: ReadinessSignal,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
    pub stop_timeout: Duration,
    pub terminator: TerminatorKind,
    pub sweep_names: Vec<String>,
    pub output_buffer: usize,
    pub tail_lines: usize,
}

impl ServiceConfig {
    pub fn name(&self) -> &str {
        &self.launch.name
    }
}

/// Validated `[subject]` section.
#[derive(Debug, Clone)]
pub struct SubjectConfig {
    pub program: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub mode: RunMode,
    pub timeout: Duration,
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            program: None,
            config_file: None,
            cwd: None,
            mode: RunMode::default(),
            timeout: Duration::from_secs(30),
        }
    }
}
