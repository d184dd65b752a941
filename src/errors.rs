// src/errors.rs

//! Crate-wide error type.
//!
//! Library code returns [`HarnessError`]; binaries and subject command
//! handlers use `anyhow` for context and convert through `Other`.

use std::time::Duration;

use thiserror::Error;

use crate::supervisor::lifecycle::{LifecycleEvent, ServiceState};

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to launch '{name}': {source}")]
    Launch {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "service '{name}' not ready after {}ms; last output:\n{}",
        .elapsed.as_millis(),
        .last_output.join("\n")
    )]
    ReadinessTimeout {
        name: String,
        elapsed: Duration,
        last_output: Vec<String>,
    },

    #[error(
        "service '{name}' exited unexpectedly (code {code:?}); last output:\n{}",
        .last_output.join("\n")
    )]
    ServiceExited {
        name: String,
        code: Option<i32>,
        last_output: Vec<String>,
    },

    #[error("command {args:?} failed with exit code {exit_code:?}: {stderr}")]
    Command {
        args: Vec<String>,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("command {args:?} timed out after {}ms", .elapsed.as_millis())]
    CommandTimedOut { args: Vec<String>, elapsed: Duration },

    #[error("failed to decode command output: {0}")]
    Decode(String),

    #[error("no '{label}' line found in output: {output}")]
    PatternNotFound { label: String, output: String },

    #[error("capture group {group} not present in match ({available} groups available)")]
    CaptureGroupMissing { group: String, available: usize },

    #[error("failed to stop '{name}': {reason}")]
    Shutdown { name: String, reason: String },

    #[error("invalid lifecycle transition: {event:?} while {from:?}")]
    InvalidTransition {
        from: ServiceState,
        event: LifecycleEvent,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HarnessError>;
