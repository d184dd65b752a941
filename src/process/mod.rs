// src/process/mod.rs

//! OS process layer.
//!
//! - [`launcher`] builds and spawns a child with piped output and returns a
//!   [`ManagedProcess`], the sole owner of that child.
//! - [`pump`] drains a child's output stream in a dedicated Tokio task and
//!   republishes every line (tracing sink, diagnostic tail, line feed).
//! - [`terminator`] holds the platform-specific ways of stopping a child.

pub mod launcher;
pub mod pump;
pub mod terminator;

pub use launcher::{launch, LaunchSpec, LaunchTarget, ManagedProcess};
pub use pump::{LineSink, OutputPump, OutputTail, PumpOutputs, StreamKind, TracingSink};
pub use terminator::{build_terminator, ProcessTerminator};
