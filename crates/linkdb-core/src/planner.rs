//! # Operation Planner
//!
//! Turns solutions into create / update / delete / confirm operations.
//!
//! For every solution both pattern lists are instantiated into links. When
//! the two lists are the same (compared in index order) the solution is a
//! read and only confirms what it matched. Otherwise both lists are keyed by
//! index and diffed, producing exactly one operation per index. Links with
//! no explicit index are paired in pattern order instead.
//!
//! Planning never touches the store: confirmations carry the restriction
//! link and the executor looks up the stored links it matches.

use crate::pattern::Pattern;
use crate::primitives::{ANY, NULL};
use crate::solver::Solution;
use crate::trace::Tracer;
use crate::{Address, Link};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One planned change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Present only in the substitution.
    Create(Link),
    /// Present on both sides with different content.
    Update { before: Link, after: Link },
    /// Present only in the restriction.
    Delete(Link),
    /// A read: report the stored links matching this restriction.
    Confirm(Link),
}

impl Operation {
    /// The restriction side, if any.
    #[must_use]
    pub fn before(&self) -> Option<Link> {
        match self {
            Self::Create(_) => None,
            Self::Update { before, .. } => Some(*before),
            Self::Delete(link) | Self::Confirm(link) => Some(*link),
        }
    }

    /// The substitution side, if any.
    #[must_use]
    pub fn after(&self) -> Option<Link> {
        match self {
            Self::Delete(_) => None,
            Self::Update { after, .. } => Some(*after),
            Self::Create(link) | Self::Confirm(link) => Some(*link),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(link) => write!(f, "create {}", link),
            Self::Update { before, after } => write!(f, "update {} -> {}", before, after),
            Self::Delete(link) => write!(f, "delete {}", link),
            Self::Confirm(link) => write!(f, "confirm {}", link),
        }
    }
}

/// What the plan wants an index to hold once it has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intended {
    Link(Link),
    Tombstone,
}

/// The operations of a whole query, across all solutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub operations: Vec<Operation>,
}

impl Plan {
    /// Final state per concrete index, from the substitution sides.
    ///
    /// Later operations on the same index override earlier ones.
    #[must_use]
    pub fn intended_final_state(&self) -> BTreeMap<Address, Intended> {
        let mut state = BTreeMap::new();
        for operation in &self.operations {
            let (index, intended) = match (operation.before(), operation.after()) {
                (_, Some(after)) => (after.index, Intended::Link(after)),
                (Some(before), None) => (before.index, Intended::Tombstone),
                (None, None) => continue,
            };
            if index != NULL && index != ANY {
                state.insert(index, intended);
            }
        }
        state
    }

    /// Concrete indices the plan deletes on purpose.
    #[must_use]
    pub fn intended_deletions(&self) -> BTreeSet<Address> {
        self.operations
            .iter()
            .filter_map(|operation| match operation {
                Operation::Delete(link) if link.index != ANY => Some(link.index),
                _ => None,
            })
            .collect()
    }
}

/// Plan every solution of a query.
pub fn plan(
    solutions: &[Solution],
    restrictions: &[Pattern],
    substitutions: &[Pattern],
    tracer: &dyn Tracer,
) -> Plan {
    let mut operations = Vec::new();
    for solution in solutions {
        let before = instantiate_all(restrictions, &solution.bindings);
        let after = instantiate_all(substitutions, &solution.bindings);

        if is_noop(&before, &after) {
            tracer.event(
                "planner",
                format_args!("solution {:?} is a read", solution.bindings),
            );
            operations.extend(before.into_iter().map(Operation::Confirm));
            continue;
        }
        operations.extend(diff(&before, &after, tracer));
    }
    Plan { operations }
}

fn instantiate_all(patterns: &[Pattern], bindings: &BTreeMap<String, Address>) -> Vec<Link> {
    patterns
        .iter()
        .map(|pattern| pattern.instantiate(bindings))
        .collect()
}

/// Both lists hold the same links once sorted by index.
#[must_use]
pub fn is_noop(before: &[Link], after: &[Link]) -> bool {
    if before.len() != after.len() {
        return false;
    }
    let mut before = before.to_vec();
    let mut after = after.to_vec();
    before.sort_by_key(|link| link.index);
    after.sort_by_key(|link| link.index);
    before == after
}

/// Classify every index of the two sides into exactly one operation.
///
/// Index 0 carries no slot and is ignored. When one side names an index
/// twice, the later link wins. Links without an explicit index are paired in
/// order across the sides; an unpaired one is a create or a delete.
pub fn diff(before: &[Link], after: &[Link], tracer: &dyn Tracer) -> Vec<Operation> {
    let (before, before_slotless) = keyed(before, "restriction", tracer);
    let (after, after_slotless) = keyed(after, "substitution", tracer);
    let indices: BTreeSet<Address> = before.keys().chain(after.keys()).copied().collect();

    let slotted = indices
        .into_iter()
        .map(|index| (before.get(&index).copied(), after.get(&index).copied()));
    let pairs = before_slotless.len().max(after_slotless.len());
    let slotless =
        (0..pairs).map(|i| (before_slotless.get(i).copied(), after_slotless.get(i).copied()));

    slotted
        .chain(slotless)
        .filter_map(|sides| {
            let operation = classify(sides)?;
            tracer.event("planner", format_args!("{}", operation));
            Some(operation)
        })
        .collect()
}

fn classify(sides: (Option<Link>, Option<Link>)) -> Option<Operation> {
    let operation = match sides {
        (Some(b), Some(a)) if b.source == a.source && b.target == a.target => {
            Operation::Confirm(b)
        }
        (Some(before), Some(after)) => Operation::Update { before, after },
        (Some(b), None) => Operation::Delete(b),
        (None, Some(a)) => Operation::Create(a),
        (None, None) => return None,
    };
    Some(operation)
}

/// Split a side into links keyed by concrete index and links without one.
fn keyed(
    links: &[Link],
    side: &str,
    tracer: &dyn Tracer,
) -> (BTreeMap<Address, Link>, Vec<Link>) {
    let mut by_index = BTreeMap::new();
    let mut slotless = Vec::new();
    for link in links.iter().filter(|link| link.index != NULL) {
        if link.index == ANY {
            slotless.push(*link);
            continue;
        }
        if let Some(previous) = by_index.insert(link.index, *link) {
            tracer.event(
                "planner",
                format_args!("{} repeats an index: {} replaces {}", side, link, previous),
            );
        }
    }
    (by_index, slotless)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse;
    use crate::trace::NoopTracer;
    use crate::trace::testing::RecordingTracer;

    fn patterns(text: &str) -> Vec<Pattern> {
        let expr = parse(text).expect("parse");
        expr.values.iter().map(Pattern::compile).collect()
    }

    fn solution(bindings: &[(&str, Address)]) -> Solution {
        Solution {
            bindings: bindings
                .iter()
                .map(|(name, value)| ((*name).to_string(), *value))
                .collect(),
            witnesses: Vec::new(),
        }
    }

    #[test]
    fn identical_sides_confirm() {
        let pattern = patterns("(($i: $s $t))");
        let solutions = [solution(&[("$i", 1), ("$s", 1), ("$t", 1)])];
        let plan = plan(&solutions, &pattern, &pattern, &NoopTracer);

        assert_eq!(plan.operations, vec![Operation::Confirm(Link::new(1, 1, 1))]);
    }

    #[test]
    fn noop_ignores_pattern_order() {
        let before = [Link::new(2, 2, 2), Link::new(1, 1, 1)];
        let after = [Link::new(1, 1, 1), Link::new(2, 2, 2)];
        assert!(is_noop(&before, &after));
        assert!(!is_noop(&before, &after[..1]));
    }

    #[test]
    fn swap_plans_updates() {
        let restriction = patterns("(($i: $s $t))");
        let substitution = patterns("(($i: $t $s))");
        let solutions = [
            solution(&[("$i", 1), ("$s", 1), ("$t", 2)]),
            solution(&[("$i", 2), ("$s", 2), ("$t", 1)]),
        ];
        let plan = plan(&solutions, &restriction, &substitution, &NoopTracer);

        assert_eq!(
            plan.operations,
            vec![
                Operation::Update {
                    before: Link::new(1, 1, 2),
                    after: Link::new(1, 2, 1),
                },
                Operation::Update {
                    before: Link::new(2, 2, 1),
                    after: Link::new(2, 1, 2),
                },
            ]
        );
    }

    #[test]
    fn diff_classifies_each_index_once() {
        let before = [Link::new(1, 1, 1), Link::new(2, 2, 2), Link::new(3, 3, 3)];
        let after = [Link::new(1, 1, 1), Link::new(2, 2, 1), Link::new(4, 4, 4)];
        let operations = diff(&before, &after, &NoopTracer);

        assert_eq!(
            operations,
            vec![
                Operation::Confirm(Link::new(1, 1, 1)),
                Operation::Update {
                    before: Link::new(2, 2, 2),
                    after: Link::new(2, 2, 1),
                },
                Operation::Delete(Link::new(3, 3, 3)),
                Operation::Create(Link::new(4, 4, 4)),
            ]
        );
    }

    #[test]
    fn duplicate_index_keeps_last() {
        let tracer = RecordingTracer::default();
        let after = [Link::new(5, 1, 1), Link::new(5, 2, 2)];
        let operations = diff(&[], &after, &tracer);

        assert_eq!(operations, vec![Operation::Create(Link::new(5, 2, 2))]);
        assert!(
            tracer
                .events
                .borrow()
                .iter()
                .any(|(_, message)| message.contains("repeats an index"))
        );
    }

    #[test]
    fn slotless_links_each_get_an_operation() {
        let before = [Link::new(1, 1, 1), Link::new(ANY, 3, 3)];
        let after = [
            Link::new(1, 1, 1),
            Link::new(ANY, 2, 2),
            Link::new(ANY, 2, 1),
        ];
        let operations = diff(&before, &after, &NoopTracer);

        assert_eq!(
            operations,
            vec![
                Operation::Confirm(Link::new(1, 1, 1)),
                Operation::Update {
                    before: Link::new(ANY, 3, 3),
                    after: Link::new(ANY, 2, 2),
                },
                Operation::Create(Link::new(ANY, 2, 1)),
            ]
        );
    }

    #[test]
    fn unpaired_slotless_restriction_is_deleted() {
        let before = [Link::new(ANY, 1, 2), Link::new(ANY, 2, 2)];
        let after = [Link::new(ANY, 1, 2)];
        let operations = diff(&before, &after, &NoopTracer);

        assert_eq!(
            operations,
            vec![
                Operation::Confirm(Link::new(ANY, 1, 2)),
                Operation::Delete(Link::new(ANY, 2, 2)),
            ]
        );
    }

    #[test]
    fn null_index_is_ignored() {
        let operations = diff(&[Link::new(0, 1, 1)], &[], &NoopTracer);
        assert!(operations.is_empty());
    }

    #[test]
    fn intended_state_tracks_after_sides() {
        let plan = Plan {
            operations: vec![
                Operation::Update {
                    before: Link::new(1, 1, 2),
                    after: Link::new(1, 2, 1),
                },
                Operation::Delete(Link::new(2, 2, 2)),
                Operation::Create(Link::new(ANY, 3, 3)),
            ],
        };
        let state = plan.intended_final_state();

        assert_eq!(state.get(&1), Some(&Intended::Link(Link::new(1, 2, 1))));
        assert_eq!(state.get(&2), Some(&Intended::Tombstone));
        assert_eq!(state.len(), 2);
        assert_eq!(plan.intended_deletions(), BTreeSet::from([2]));
    }
}
