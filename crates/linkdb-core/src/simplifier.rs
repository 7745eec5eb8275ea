//! # Change Simplifier
//!
//! Collapses a raw event log into the minimal set of logical transitions.
//!
//! The store reports intermediate hops (`(0: 0 0) -> (1: 0 0) -> (1: 1 2)`);
//! callers usually want only `(0: 0 0) -> (1: 1 2)`. Transitions form a
//! graph from `before` to `after`. Every chain is followed from a node that
//! is never an `after` to a node that is never a `before` (or a dead end).
//!
//! The output is sorted by `after` and is the same for the same input.

use crate::{Change, Link};
use std::collections::{BTreeMap, BTreeSet};

/// Simplify raw `(before, after)` events.
#[must_use]
pub fn simplify(events: &[Change]) -> Vec<Change> {
    if events.is_empty() {
        return Vec::new();
    }

    let events = drop_transient_deletions(events);
    let (unchanged, changed): (Vec<Change>, Vec<Change>) =
        events.iter().partition(|change| change.is_unchanged());

    let befores: BTreeSet<Link> = changed.iter().map(|change| change.before).collect();
    let afters: BTreeSet<Link> = changed.iter().map(|change| change.after).collect();

    let mut initial = Vec::new();
    let mut seen = BTreeSet::new();
    for change in &changed {
        if !afters.contains(&change.before) && seen.insert(change.before) {
            initial.push(change.before);
        }
    }
    if initial.is_empty() {
        // No origin to start from: report the log as it is.
        return events;
    }
    let finals: BTreeSet<Link> = afters.difference(&befores).copied().collect();

    let mut edges: BTreeMap<Link, Vec<Link>> = BTreeMap::new();
    for change in &changed {
        edges.entry(change.before).or_default().push(change.after);
    }

    let mut result = unchanged;
    for origin in initial {
        let mut stack = vec![origin];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let next = edges.get(&current).filter(|next| !next.is_empty());
            if finals.contains(&current) || next.is_none() {
                result.push(Change::new(origin, current));
            }
            if let Some(next) = next {
                stack.extend(next.iter().copied());
            }
        }
    }

    result.sort_by_key(|change| change.after);
    result
}

/// When one `before` leads both to the null link and elsewhere, the null
/// transition is an artifact of intermediate store work and is dropped.
fn drop_transient_deletions(events: &[Change]) -> Vec<Change> {
    let mut has_real_transition = BTreeSet::new();
    for change in events {
        if !change.after.is_null() {
            has_real_transition.insert(change.before);
        }
    }

    // Grouped by `before`, in order of first appearance.
    let mut order = Vec::new();
    let mut groups: BTreeMap<Link, Vec<Change>> = BTreeMap::new();
    for change in events {
        let group = groups.entry(change.before).or_default();
        if group.is_empty() {
            order.push(change.before);
        }
        group.push(*change);
    }

    let mut kept = Vec::with_capacity(events.len());
    for before in order {
        let group = groups.remove(&before).unwrap_or_default();
        let fan_out = group.len() > 1 && has_real_transition.contains(&before);
        kept.extend(
            group
                .into_iter()
                .filter(|change| !(fan_out && change.after.is_null())),
        );
    }
    kept
}
