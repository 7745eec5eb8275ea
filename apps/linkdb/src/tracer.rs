//! # Engine Tracing Bridge
//!
//! Forwards engine trace events to `tracing`.

use linkdb_core::Tracer;
use std::fmt;

/// Target used for every forwarded engine event.
///
/// `--trace` raises this target to `debug`.
pub const ENGINE_TARGET: &str = "linkdb::engine";

/// A `Tracer` that emits `tracing::debug!` events under `linkdb::engine`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn event(&self, scope: &'static str, message: fmt::Arguments<'_>) {
        tracing::debug!(target: "linkdb::engine", scope, "{}", message);
    }
}
