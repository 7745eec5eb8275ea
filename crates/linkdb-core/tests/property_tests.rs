//! # Property-Based Tests
//!
//! Invariants of the store and the query engine under generated input.

use linkdb_core::planner::{Operation, diff};
use linkdb_core::primitives::ANY;
use linkdb_core::{Change, Flow, Link, LinkStore, Links, NoopTracer, QueryProcessor, simplify};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn silent(_: Link, _: Link) -> Flow {
    Flow::Continue
}

fn store_from(pairs: &[(u64, u64)]) -> Links {
    let mut links = Links::new();
    for (source, target) in pairs {
        links
            .get_or_create(*source, *target, &mut silent)
            .expect("create");
    }
    links
}

/// Links with distinct indices, as one side of a planned solution.
fn side() -> impl Strategy<Value = Vec<Link>> {
    vec((1u64..8, 1u64..5, 1u64..5), 0..6).prop_map(|triples| {
        let mut seen = BTreeSet::new();
        triples
            .into_iter()
            .filter(|(index, _, _)| seen.insert(*index))
            .map(|(index, source, target)| Link::new(index, source, target))
            .collect()
    })
}

#[derive(Debug, Clone)]
enum Step {
    Create(u64, u64),
    Update(u64, u64, u64),
    Delete(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1u64..6, 1u64..6).prop_map(|(s, t)| Step::Create(s, t)),
        (1u64..8, 1u64..6, 1u64..6).prop_map(|(i, s, t)| Step::Update(i, s, t)),
        (1u64..8).prop_map(Step::Delete),
    ]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Reading everything back changes nothing and confirms every link once.
    #[test]
    fn read_back_is_idempotent(pairs in vec((1u64..6, 1u64..6), 1..12)) {
        let mut links = store_from(&pairs);
        let before = links.all().expect("all");

        let changes = QueryProcessor::new()
            .process(&mut links, "((($i: $s $t)) (($i: $s $t)))")
            .expect("query");

        prop_assert_eq!(links.all().expect("all"), before.clone());
        prop_assert!(changes.iter().all(Change::is_unchanged));
        let confirmed: Vec<Link> = changes.iter().map(|change| change.after).collect();
        prop_assert_eq!(confirmed, before);
    }

    /// Every index on either side gets exactly one operation, in index order.
    #[test]
    fn diff_covers_each_index_once(before in side(), after in side()) {
        let operations = diff(&before, &after, &NoopTracer);

        let expected: BTreeSet<u64> = before
            .iter()
            .chain(&after)
            .map(|link| link.index)
            .collect();
        let indices: Vec<u64> = operations
            .iter()
            .filter_map(|operation| operation.before().or(operation.after()))
            .map(|link| link.index)
            .collect();
        prop_assert_eq!(indices, expected.into_iter().collect::<Vec<_>>());

        for operation in &operations {
            if let Operation::Update { before, after } = operation {
                prop_assert_eq!(before.index, after.index);
                prop_assert!((before.source, before.target) != (after.source, after.target));
            }
        }
    }

    /// Simplification is a pure function of its input and sorted by `after`.
    #[test]
    fn simplify_is_deterministic(pairs in vec((1u64..6, 1u64..6), 1..10)) {
        let mut links = Links::new();
        let query = pairs
            .iter()
            .map(|(s, t)| format!("({} {})", s, t))
            .collect::<Vec<_>>()
            .join(" ");
        let events = QueryProcessor::new()
            .process(&mut links, &format!("() ({})", query))
            .expect("query");

        let first = simplify(&events);
        prop_assert_eq!(&first, &simplify(&events));
        prop_assert!(first.windows(2).all(|pair| pair[0].after <= pair[1].after));
    }

    /// No sequence of writes leaves two links with the same content.
    #[test]
    fn content_stays_unique(steps in vec(step(), 1..40)) {
        let mut links = Links::new();
        for step in steps {
            match step {
                Step::Create(source, target) => {
                    links.get_or_create(source, target, &mut silent).expect("create");
                }
                Step::Update(index, source, target) => {
                    if links.exists(index).expect("exists") {
                        links
                            .update(
                                Link::new(index, ANY, ANY),
                                Link::new(index, source, target),
                                &mut silent,
                            )
                            .expect("update");
                    }
                }
                Step::Delete(index) => {
                    if links.exists(index).expect("exists") {
                        links.delete(Link::empty(index), &mut silent).expect("delete");
                    }
                }
            }
        }

        let all = links.all().expect("all");
        let contents: BTreeSet<(u64, u64)> = all
            .iter()
            .map(|link| (link.source, link.target))
            .collect();
        prop_assert_eq!(contents.len(), all.len());
        prop_assert_eq!(all.len(), links.count().expect("count"));
    }
}
