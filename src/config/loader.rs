// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{HarnessConfig, RawHarnessConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawHarnessConfig`.
///
/// This only performs TOML deserialization; it does **not** validate.
/// Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawHarnessConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawHarnessConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path, resolve relative paths against the
/// config file's directory, and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<HarnessConfig> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;
    rebase_paths(&mut raw, &config_root_dir(path));
    HarnessConfig::try_from(raw)
}

/// Default config path: `Emuharness.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Emuharness.toml")
}

/// - If the config path has a non-empty parent (e.g. "tests/Emuharness.toml"),
///   we use that directory.
/// - If it's just a bare filename, fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn rebase_paths(raw: &mut RawHarnessConfig, root: &Path) {
    let service = &mut raw.service;
    rebase(&mut service.cwd, root);
    rebase(&mut service.manifest_path, root);
    rebase_program(&mut service.program, root);

    let subject = &mut raw.subject;
    rebase(&mut subject.cwd, root);
    rebase(&mut subject.config_file, root);
    rebase_program(&mut subject.program, root);
}

fn rebase(field: &mut Option<String>, root: &Path) {
    if let Some(value) = field.as_mut() {
        let p = Path::new(value.as_str());
        if p.is_relative() {
            *value = root.join(p).to_string_lossy().into_owned();
        }
    }
}

/// Bare program names (`"emu"`) are looked up on `PATH`, so only rebase
/// programs that carry a directory component.
fn rebase_program(field: &mut Option<String>, root: &Path) {
    let has_dir = field
        .as_deref()
        .map(|p| Path::new(p).components().count() > 1)
        .unwrap_or(false);
    if has_dir {
        rebase(field, root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_rebase_only_applies_to_paths() {
        let root = Path::new("/work");

        let mut bare = Some("emu".to_string());
        rebase_program(&mut bare, root);
        assert_eq!(bare.as_deref(), Some("emu"));

        let mut relative = Some("bin/emu".to_string());
        rebase_program(&mut relative, root);
        assert_eq!(
            relative.map(PathBuf::from),
            Some(PathBuf::from("/work").join("bin/emu"))
        );
    }
}
