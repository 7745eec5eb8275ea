//! # Query Processor
//!
//! Entry point of the engine: one query text in, the raw change log out.
//!
//! A query is two groups, `(restriction) (substitution)`:
//!
//! - both empty: nothing happens
//! - empty restriction: the substitution trees are created
//! - empty substitution: everything the restriction matches is deleted
//! - otherwise: solve the restriction, plan each solution, execute the plan
//!
//! Malformed shapes and unsatisfiable restrictions are not errors; the query
//! simply changes nothing.

use crate::executor;
use crate::notation::{self, Expr};
use crate::pattern::{self, Pattern};
use crate::planner;
use crate::simplifier::simplify;
use crate::solver;
use crate::store::LinkStore;
use crate::trace::{NoopTracer, Tracer};
use crate::{Change, Flow, LinkError};

static NOOP: NoopTracer = NoopTracer;

/// Runs queries against a store, reporting through a `Tracer`.
///
/// Holds no state between queries.
#[derive(Clone, Copy)]
pub struct QueryProcessor<'t> {
    tracer: &'t dyn Tracer,
}

impl Default for QueryProcessor<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryProcessor<'static> {
    /// A processor that discards trace events.
    #[must_use]
    pub fn new() -> Self {
        Self { tracer: &NOOP }
    }
}

impl<'t> QueryProcessor<'t> {
    /// A processor that reports to `tracer`.
    #[must_use]
    pub fn with_tracer(tracer: &'t dyn Tracer) -> Self {
        Self { tracer }
    }

    /// Run `query` and return every raw event, confirmations included.
    pub fn process<S: LinkStore + ?Sized>(
        &self,
        store: &mut S,
        query: &str,
    ) -> Result<Vec<Change>, LinkError> {
        let expr = notation::parse(query)?;
        self.dispatch(store, &expr)
    }

    /// Run `query`, forwarding raw events to `handler` until it returns
    /// `Flow::Break`. The query itself always runs to completion.
    pub fn process_with_handler<S, H>(
        &self,
        store: &mut S,
        query: &str,
        mut handler: H,
    ) -> Result<(), LinkError>
    where
        S: LinkStore + ?Sized,
        H: FnMut(Change) -> Flow,
    {
        for change in self.process(store, query)? {
            if handler(change).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Run `query` and return the minimal set of transitions.
    pub fn process_simplified<S: LinkStore + ?Sized>(
        &self,
        store: &mut S,
        query: &str,
    ) -> Result<Vec<Change>, LinkError> {
        Ok(simplify(&self.process(store, query)?))
    }

    fn dispatch<S: LinkStore + ?Sized>(
        &self,
        store: &mut S,
        expr: &Expr,
    ) -> Result<Vec<Change>, LinkError> {
        let [restriction, substitution, ..] = expr.values.as_slice() else {
            self.tracer.event(
                "query",
                format_args!("no-op: expected a restriction and a substitution"),
            );
            return Ok(Vec::new());
        };

        let well_formed = restriction
            .values
            .iter()
            .chain(&substitution.values)
            .all(pattern::is_well_formed);
        if !well_formed {
            self.tracer.event(
                "query",
                format_args!("no-op: a pattern has neither zero nor two children"),
            );
            return Ok(Vec::new());
        }

        let restrictions = pattern::compile_side(restriction);
        let substitutions = pattern::compile_side(substitution);
        self.trace_side("restriction", &restrictions);
        self.trace_side("substitution", &substitutions);

        let log = match (restrictions.is_empty(), substitutions.is_empty()) {
            (true, true) => {
                self.tracer.event("query", format_args!("no-op: both sides empty"));
                return Ok(Vec::new());
            }
            (true, false) => executor::create_patterns(store, &substitutions, self.tracer)?,
            (false, true) => executor::delete_matching(store, &restrictions, self.tracer)?,
            (false, false) => {
                let solutions = solver::solve(&*store, &restrictions, self.tracer)?;
                if solutions.is_empty() {
                    self.tracer.event("query", format_args!("no solutions"));
                    return Ok(Vec::new());
                }
                let plan = planner::plan(&solutions, &restrictions, &substitutions, self.tracer);
                executor::execute(store, &plan, self.tracer)?
            }
        };

        self.tracer
            .event("query", format_args!("{} raw events", log.events.len()));
        Ok(log.events)
    }

    fn trace_side(&self, side: &str, patterns: &[Pattern]) {
        for pattern in patterns {
            self.tracer.event("query", format_args!("{}: {}", side, pattern));
        }
    }
}
