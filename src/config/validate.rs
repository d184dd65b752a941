// src/config/validate.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    HarnessConfig, RawHarnessConfig, RawReadiness, RawServiceConfig, RawSubjectConfig,
    ServiceConfig, SubjectConfig,
};
use crate::errors::{HarnessError, Result};
use crate::process::terminator::resolve_kind;
use crate::process::{LaunchSpec, LaunchTarget};
use crate::readiness::ReadinessSignal;

impl TryFrom<RawHarnessConfig> for HarnessConfig {
    type Error = HarnessError;

    fn try_from(raw: RawHarnessConfig) -> std::result::Result<Self, Self::Error> {
        Ok(HarnessConfig {
            service: ServiceConfig::try_from(raw.service)?,
            subject: SubjectConfig::try_from(raw.subject)?,
        })
    }
}

impl TryFrom<RawServiceConfig> for ServiceConfig {
    type Error = HarnessError;

    fn try_from(raw: RawServiceConfig) -> std::result::Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(config_error("[service].name must not be empty"));
        }

        let target = launch_target(&raw)?;
        let readiness = readiness_signal(&raw.readiness)?;

        let readiness_timeout = duration_field("readiness_timeout", &raw.readiness_timeout)?;
        let poll_interval = duration_field("poll_interval", &raw.poll_interval)?;
        let stop_timeout = duration_field("stop_timeout", &raw.stop_timeout)?;
        for (field, value) in [
            ("readiness_timeout", readiness_timeout),
            ("poll_interval", poll_interval),
            ("stop_timeout", stop_timeout),
        ] {
            if value.is_zero() {
                return Err(config_error(format!(
                    "[service].{field} must be greater than zero"
                )));
            }
        }

        // broadcast::channel panics on a zero capacity.
        if raw.output_buffer == 0 {
            return Err(config_error("[service].output_buffer must be >= 1 (got 0)"));
        }
        if raw.tail_lines == 0 {
            return Err(config_error("[service].tail_lines must be >= 1 (got 0)"));
        }

        let sweep_names = raw
            .sweep_names
            .clone()
            .unwrap_or_else(|| vec![raw.name.clone()]);

        Ok(ServiceConfig {
            launch: LaunchSpec {
                name: raw.name,
                target,
                args: raw.args,
                cwd: raw.cwd.map(PathBuf::from),
                env: raw.env,
            },
            readiness,
            readiness_timeout,
            poll_interval,
            stop_timeout,
            terminator: resolve_kind(raw.terminator),
            sweep_names,
            output_buffer: raw.output_buffer,
            tail_lines: raw.tail_lines,
        })
    }
}

impl TryFrom<RawSubjectConfig> for SubjectConfig {
    type Error = HarnessError;

    fn try_from(raw: RawSubjectConfig) -> std::result::Result<Self, Self::Error> {
        let timeout = duration_field("timeout", &raw.timeout)?;
        if timeout.is_zero() {
            return Err(config_error("[subject].timeout must be greater than zero"));
        }

        Ok(SubjectConfig {
            program: raw.program.map(PathBuf::from),
            config_file: raw.config_file.map(PathBuf::from),
            cwd: raw.cwd.map(PathBuf::from),
            mode: raw.mode,
            timeout,
        })
    }
}

fn launch_target(raw: &RawServiceConfig) -> Result<LaunchTarget> {
    match (&raw.program, &raw.cargo_bin) {
        (Some(program), None) => Ok(LaunchTarget::Program(PathBuf::from(program))),
        (None, Some(bin)) => Ok(LaunchTarget::CargoBin {
            bin: bin.clone(),
            manifest_path: raw.manifest_path.as_ref().map(PathBuf::from),
        }),
        (Some(_), Some(_)) => Err(config_error(format!(
            "service '{}' sets both `program` and `cargo_bin`; pick one",
            raw.name
        ))),
        (None, None) => Err(config_error(format!(
            "service '{}' needs either `program` or `cargo_bin`",
            raw.name
        ))),
    }
}

fn readiness_signal(raw: &RawReadiness) -> Result<ReadinessSignal> {
    match raw {
        RawReadiness::Log { pattern } => {
            let pattern = Regex::new(pattern).map_err(|e| {
                config_error(format!("invalid readiness pattern '{pattern}': {e}"))
            })?;
            Ok(ReadinessSignal::LogPattern { pattern })
        }
        RawReadiness::Port { address, probe } => Ok(ReadinessSignal::Port {
            address: parse_probe_address(address)?,
            probe: *probe,
        }),
    }
}

/// Parse a probe address. `":3570"` is shorthand for `127.0.0.1:3570`.
fn parse_probe_address(s: &str) -> Result<SocketAddr> {
    let s = s.trim();
    let full = if s.starts_with(':') {
        format!("127.0.0.1{s}")
    } else {
        s.to_string()
    };
    full.parse::<SocketAddr>()
        .map_err(|e| config_error(format!("invalid readiness address '{s}': {e}")))
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| config_error(format!("invalid `{field}`: {e}")))
}

fn config_error(msg: impl Into<String>) -> HarnessError {
    HarnessError::ConfigError(msg.into())
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60, s),
        "h" => scaled_secs(value, 60 * 60, s),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn scaled_secs(value: u64, factor: u64, raw: &str) -> std::result::Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is out of range", raw))
}
