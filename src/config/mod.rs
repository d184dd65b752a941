// src/config/mod.rs

//! Configuration loading and validation for emuharness.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into typed, ready-to-use settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    HarnessConfig, RawHarnessConfig, RawReadiness, RawServiceConfig, RawSubjectConfig,
    ServiceConfig, SubjectConfig,
};
pub use validate::parse_duration;
