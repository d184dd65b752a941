#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;

use emuharness::config::{
    RawReadiness, RawServiceConfig, RawSubjectConfig, ServiceConfig, SubjectConfig,
};
use emuharness::types::{ProbeMethod, RunMode, TerminatorKind};

/// Builder for `ServiceConfig` to simplify test setup.
pub struct ServiceConfigBuilder {
    raw: RawServiceConfig,
}

impl ServiceConfigBuilder {
    /// Service launched from `program`, ready when stdout matches `pattern`.
    pub fn log(name: &str, program: impl AsRef<Path>, pattern: &str) -> Self {
        let mut raw = RawServiceConfig::new(
            name,
            RawReadiness::Log {
                pattern: pattern.to_string(),
            },
        );
        raw.program = Some(path_string(program));
        Self { raw }
    }

    /// Service launched from `program`, ready when `address` passes `probe`.
    pub fn port(
        name: &str,
        program: impl AsRef<Path>,
        address: SocketAddr,
        probe: ProbeMethod,
    ) -> Self {
        let mut raw = RawServiceConfig::new(
            name,
            RawReadiness::Port {
                address: address.to_string(),
                probe,
            },
        );
        raw.program = Some(path_string(program));
        Self { raw }
    }

    /// `sh -c <script>`, ready when stdout matches `pattern`.
    pub fn sh(name: &str, script: &str, pattern: &str) -> Self {
        Self::log(name, "sh", pattern).args(["-c", script])
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn readiness_timeout(mut self, value: &str) -> Self {
        self.raw.readiness_timeout = value.to_string();
        self
    }

    pub fn poll_interval(mut self, value: &str) -> Self {
        self.raw.poll_interval = value.to_string();
        self
    }

    pub fn stop_timeout(mut self, value: &str) -> Self {
        self.raw.stop_timeout = value.to_string();
        self
    }

    pub fn terminator(mut self, kind: TerminatorKind) -> Self {
        self.raw.terminator = kind;
        self
    }

    pub fn sweep_names(mut self, names: &[&str]) -> Self {
        self.raw.sweep_names = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn tail_lines(mut self, n: usize) -> Self {
        self.raw.tail_lines = n;
        self
    }

    pub fn raw(&self) -> &RawServiceConfig {
        &self.raw
    }

    pub fn build(self) -> ServiceConfig {
        ServiceConfig::try_from(self.raw).expect("Failed to build valid service config from builder")
    }
}

/// Builder for `SubjectConfig`.
pub struct SubjectConfigBuilder {
    raw: RawSubjectConfig,
}

impl SubjectConfigBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawSubjectConfig::default(),
        }
    }

    pub fn program(mut self, program: impl AsRef<Path>) -> Self {
        self.raw.program = Some(path_string(program));
        self
    }

    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.raw.config_file = Some(path_string(path));
        self
    }

    pub fn cwd(mut self, path: impl AsRef<Path>) -> Self {
        self.raw.cwd = Some(path_string(path));
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.raw.mode = mode;
        self
    }

    pub fn timeout(mut self, value: &str) -> Self {
        self.raw.timeout = value.to_string();
        self
    }

    pub fn build(self) -> SubjectConfig {
        SubjectConfig::try_from(self.raw).expect("Failed to build valid subject config from builder")
    }
}

impl Default for SubjectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn path_string(path: impl AsRef<Path>) -> String {
    path.as_ref().to_string_lossy().into_owned()
}
