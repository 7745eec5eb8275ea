//! # Solution Search
//!
//! Finds every variable assignment under which a conjunction of patterns
//! matches the store.
//!
//! The search is a left fold over the patterns. Each step extends every
//! partial solution of the frontier with the matches of the next pattern;
//! an empty frontier ends the search with no solutions.
//!
//! A top-level pattern picks its candidates from the store. Nested patterns
//! are then checked against the concrete addresses of the candidate using an
//! explicit goal stack, so deep nesting never deepens the call stack.

use crate::pattern::{Pattern, Term};
use crate::primitives::{ANY, NULL};
use crate::store::LinkStore;
use crate::trace::Tracer;
use crate::{Address, Link, LinkError};
use std::collections::BTreeMap;

/// One consistent assignment for a list of patterns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Solution {
    /// Variable name -> bound address.
    pub bindings: BTreeMap<String, Address>,
    /// Every stored link the match went through: top-level hits and nested
    /// composite matches, in match order.
    pub witnesses: Vec<Address>,
}

impl Solution {
    /// Bind `term` to `address`, or check an existing binding or literal.
    ///
    /// Returns false on conflict.
    fn unify(&mut self, term: &Term, address: Address) -> bool {
        match term {
            Term::Unconstrained | Term::Wildcard => true,
            Term::Literal(literal) => *literal == address,
            Term::Variable(name) => match self.bindings.get(name) {
                Some(bound) => *bound == address,
                None => {
                    self.bindings.insert(name.clone(), address);
                    true
                }
            },
        }
    }
}

/// Find all solutions of `patterns` against `store`.
///
/// An empty result means nothing matched; it is not an error.
pub fn solve<S: LinkStore + ?Sized>(
    store: &S,
    patterns: &[Pattern],
    tracer: &dyn Tracer,
) -> Result<Vec<Solution>, LinkError> {
    let mut frontier = vec![Solution::default()];
    for pattern in patterns {
        let mut next = Vec::new();
        for partial in &frontier {
            next.extend(matches(store, pattern, partial)?);
        }
        tracer.event(
            "solver",
            format_args!("{} -> {} partial solutions", pattern, next.len()),
        );
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }
    Ok(frontier)
}

/// Extensions of `partial` under which `pattern` matches a stored link.
pub fn matches<S: LinkStore + ?Sized>(
    store: &S,
    pattern: &Pattern,
    partial: &Solution,
) -> Result<Vec<Solution>, LinkError> {
    let constraint = pattern.id().resolve(&partial.bindings);
    let candidates = match pattern {
        Pattern::Leaf { .. } => store.scan(Link::new(constraint, ANY, ANY))?,
        Pattern::Composite { .. } if constraint != ANY => {
            // Exact index lookup. A missing literal index matches nothing.
            store.get(constraint)?.into_iter().collect()
        }
        Pattern::Composite { .. } => store.all()?,
    };

    let mut found = Vec::new();
    for candidate in candidates {
        let mut solution = partial.clone();
        if !solution.unify(pattern.id(), candidate.index) {
            continue;
        }
        solution.witnesses.push(candidate.index);

        let mut goals: Vec<(&Pattern, Address)> = Vec::new();
        if let Pattern::Composite { source, target, .. } = pattern {
            goals.push((&**target, candidate.target));
            goals.push((&**source, candidate.source));
        }
        if descend(store, &mut solution, goals)? {
            found.push(solution);
        }
    }
    Ok(found)
}

/// Check nested patterns against concrete addresses.
fn descend<'p, S: LinkStore + ?Sized>(
    store: &S,
    solution: &mut Solution,
    mut goals: Vec<(&'p Pattern, Address)>,
) -> Result<bool, LinkError> {
    while let Some((pattern, address)) = goals.pop() {
        match pattern {
            Pattern::Leaf { id } => {
                if !solution.unify(id, address) {
                    return Ok(false);
                }
            }
            Pattern::Composite { id, source, target } => {
                if address == NULL || address == ANY {
                    return Ok(false);
                }
                let Some(link) = store.get(address)? else {
                    return Ok(false);
                };
                if !solution.unify(id, address) {
                    return Ok(false);
                }
                solution.witnesses.push(address);
                goals.push((&**target, link.target));
                goals.push((&**source, link.source));
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse;
    use crate::store::Links;
    use crate::trace::NoopTracer;
    use crate::trace::testing::RecordingTracer;
    use crate::{Flow, Link};

    fn store_with(contents: &[(Address, Address)]) -> Links {
        let mut links = Links::new();
        let mut silent = |_: Link, _: Link| Flow::Continue;
        for (source, target) in contents {
            links
                .create_and_update(*source, *target, &mut silent)
                .expect("create");
        }
        links
    }

    fn patterns(text: &str) -> Vec<Pattern> {
        let expr = parse(text).expect("parse");
        expr.values.iter().map(Pattern::compile).collect()
    }

    fn binding(solution: &Solution, name: &str) -> Address {
        solution.bindings.get(name).copied().unwrap_or(NULL)
    }

    #[test]
    fn leaf_enumerates_all_links() {
        let links = store_with(&[(1, 1), (2, 2)]);
        let solutions = solve(&links, &patterns("$i $j"), &NoopTracer).expect("solve");
        // Two independent leaves: cross product.
        assert_eq!(solutions.len(), 4);
    }

    #[test]
    fn composite_binds_all_positions() {
        let links = store_with(&[(1, 2), (2, 1)]);
        let solutions = solve(&links, &patterns("(($i: $s $t))"), &NoopTracer).expect("solve");

        assert_eq!(solutions.len(), 2);
        assert_eq!(binding(&solutions[0], "$i"), 1);
        assert_eq!(binding(&solutions[0], "$s"), 1);
        assert_eq!(binding(&solutions[0], "$t"), 2);
        assert_eq!(solutions[0].witnesses, vec![1]);
    }

    #[test]
    fn repeated_variable_must_agree() {
        let links = store_with(&[(1, 1), (2, 2), (1, 2)]);
        let solutions =
            solve(&links, &patterns("(($i: $x $x))"), &NoopTracer).expect("solve");
        let indices: Vec<Address> = solutions.iter().map(|s| binding(s, "$i")).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn join_across_patterns() {
        let links = store_with(&[(1, 1), (2, 2), (1, 2), (2, 1)]);
        // Links starting where another ends.
        let solutions = solve(
            &links,
            &patterns("($a: 1 $m) ($b: $m 1)"),
            &NoopTracer,
        )
        .expect("solve");
        let pairs: Vec<(Address, Address)> = solutions
            .iter()
            .map(|s| (binding(s, "$a"), binding(s, "$b")))
            .collect();
        assert_eq!(pairs, vec![(1, 1), (3, 4)]);
    }

    #[test]
    fn literal_index_must_exist() {
        let links = store_with(&[(1, 1)]);
        let solutions = solve(&links, &patterns("((9: * *))"), &NoopTracer).expect("solve");
        assert!(solutions.is_empty());
    }

    #[test]
    fn nested_composites_are_witnessed() {
        let links = store_with(&[(1, 1), (2, 2), (1, 2)]);
        let solutions = solve(
            &links,
            &patterns("((3: (1: 1 1) (2: 2 2)))"),
            &NoopTracer,
        )
        .expect("solve");

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].witnesses, vec![3, 1, 2]);
    }

    #[test]
    fn nested_composite_needs_stored_link() {
        let links = store_with(&[(7, 8)]);
        let solutions =
            solve(&links, &patterns("(((* *) *))"), &NoopTracer).expect("solve");
        assert!(solutions.is_empty());
    }

    #[test]
    fn empty_step_stops_search() {
        let links = store_with(&[(1, 1)]);
        let tracer = RecordingTracer::default();
        let solutions =
            solve(&links, &patterns("(5 5) ($i: * *)"), &tracer).expect("solve");

        assert!(solutions.is_empty());
        assert_eq!(tracer.events.borrow().len(), 1);
    }
}
