//! # linkdb
//!
//! Library side of the `linkdb` binary: command-line parsing, configuration,
//! output rendering and the tracing bridge for engine events.
//!
//! Kept as a library so configuration merging and rendering can be tested
//! from `tests/` without spawning the binary.

pub mod cli;
pub mod config;
pub mod render;
pub mod tracer;
