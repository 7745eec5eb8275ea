//! # Trace Sink
//!
//! The engine reports what it is doing through an injected `Tracer` rather
//! than printing. Messages are passed as `fmt::Arguments`, so nothing is
//! formatted unless the sink wants it.

use std::fmt;

/// Receives engine trace events.
///
/// `scope` is one of `"query"`, `"solver"`, `"planner"`, `"executor"`.
pub trait Tracer {
    fn event(&self, scope: &'static str, message: fmt::Arguments<'_>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn event(&self, _scope: &'static str, _message: fmt::Arguments<'_>) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Tracer;
    use std::cell::RefCell;
    use std::fmt;

    /// Collects formatted events for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingTracer {
        pub events: RefCell<Vec<(&'static str, String)>>,
    }

    impl Tracer for RecordingTracer {
        fn event(&self, scope: &'static str, message: fmt::Arguments<'_>) {
            self.events.borrow_mut().push((scope, message.to_string()));
        }
    }
}
