//! # Executor
//!
//! Applies planned operations to a store and records every raw change.
//!
//! The store may delete links the plan never asked to delete (a merge
//! removes the merged link, a cascade removes its users). After the plan has
//! run, each such unexpected deletion whose index the plan meant to keep is
//! recreated with its intended content.
//!
//! Two more entry points serve queries with an empty side:
//! `create_patterns` builds substitution trees bottom-up, and
//! `delete_matching` removes everything a restriction matches.

use crate::pattern::{Pattern, Term};
use crate::planner::{Intended, Operation, Plan};
use crate::primitives::{ANY, NULL};
use crate::solver::{self, Solution};
use crate::store::LinkStore;
use crate::trace::Tracer;
use crate::{Address, Change, Flow, Link, LinkError};
use std::collections::BTreeSet;

/// Everything one execution did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionLog {
    /// Raw `(before, after)` events in the order they happened, including
    /// confirmations.
    pub events: Vec<Change>,
    /// Indices the store deleted without the plan asking for it.
    pub unexpected_deletions: Vec<Address>,
    /// Indices recreated after an unexpected deletion.
    pub restored: Vec<Address>,
}

impl ExecutionLog {
    fn record(&mut self) -> impl FnMut(Link, Link) -> Flow + '_ {
        |before, after| {
            self.events.push(Change::new(before, after));
            Flow::Continue
        }
    }

    fn confirm(&mut self, link: Link) {
        self.events.push(Change::confirm(link));
    }
}

/// Deletion events for indices outside `intended`, first occurrence only.
#[must_use]
pub fn unexpected_deletions(events: &[Change], intended: &BTreeSet<Address>) -> Vec<Address> {
    let mut seen = BTreeSet::new();
    events
        .iter()
        .filter(|change| change.is_deletion())
        .map(|change| change.before.index)
        .filter(|index| !intended.contains(index) && seen.insert(*index))
        .collect()
}

// =============================================================================
// PLANNED OPERATIONS
// =============================================================================

/// Run a plan, then restore what the store removed behind its back.
pub fn execute<S: LinkStore + ?Sized>(
    store: &mut S,
    plan: &Plan,
    tracer: &dyn Tracer,
) -> Result<ExecutionLog, LinkError> {
    for operation in &plan.operations {
        if let Operation::Create(link) = operation {
            ensure_concrete_content(*link)?;
        }
    }

    let intended = plan.intended_final_state();
    let mut deliberate = plan.intended_deletions();
    let mut log = ExecutionLog::default();
    let mut confirmed = BTreeSet::new();

    for operation in &plan.operations {
        tracer.event("executor", format_args!("{}", operation));
        match *operation {
            Operation::Confirm(restriction) => {
                for link in store.scan(restriction)? {
                    if confirmed.insert(link) {
                        log.confirm(link);
                    }
                }
            }
            Operation::Create(link) => create_link(store, link, &mut log)?,
            Operation::Update { before, after } => {
                update_link(store, before, after, &mut log, tracer)?;
            }
            Operation::Delete(restriction) => {
                deliberate.extend(delete_link(store, restriction, &mut log)?);
            }
        }
    }

    log.unexpected_deletions = unexpected_deletions(&log.events, &deliberate);
    for index in log.unexpected_deletions.clone() {
        tracer.event(
            "executor",
            format_args!("store deleted {} as a side effect", index),
        );
        let Some(Intended::Link(link)) = intended.get(&index).copied() else {
            continue;
        };
        if !link.is_concrete() || store.exists(index)? {
            continue;
        }
        if let Some(holder) = store.search(link.source, link.target)? {
            tracer.event(
                "executor",
                format_args!("{} stays deleted: {} already holds its content", index, holder),
            );
            continue;
        }
        store.ensure_created(index, &mut log.record())?;
        store.update(Link::new(index, ANY, ANY), link, &mut log.record())?;
        tracer.event("executor", format_args!("restored {}", link));
        log.restored.push(index);
    }

    Ok(log)
}

fn ensure_concrete_content(link: Link) -> Result<(), LinkError> {
    if link.source == ANY || link.target == ANY {
        return Err(LinkError::InvalidPattern(format!(
            "cannot create {}: source and target must be concrete",
            link
        )));
    }
    Ok(())
}

fn create_link<S: LinkStore + ?Sized>(
    store: &mut S,
    link: Link,
    log: &mut ExecutionLog,
) -> Result<(), LinkError> {
    if link.index != NULL && link.index != ANY {
        store.ensure_created(link.index, &mut log.record())?;
        store.update(Link::new(link.index, ANY, ANY), link, &mut log.record())?;
        return Ok(());
    }
    let (index, created) = store.get_or_create(link.source, link.target, &mut log.record())?;
    if !created {
        log.confirm(Link::new(index, link.source, link.target));
    }
    Ok(())
}

fn update_link<S: LinkStore + ?Sized>(
    store: &mut S,
    before: Link,
    after: Link,
    log: &mut ExecutionLog,
    tracer: &dyn Tracer,
) -> Result<(), LinkError> {
    let targets = if before.index == ANY {
        store.scan(before)?
    } else {
        store.get(before.index)?.into_iter().collect()
    };
    if targets.is_empty() {
        tracer.event("executor", format_args!("nothing left to update for {}", before));
    }

    for target in targets {
        // An earlier update in this loop may have merged it away.
        if !store.exists(target.index)? {
            continue;
        }
        let substitution = Link::new(target.index, after.source, after.target);
        let same_source = after.source == ANY || after.source == target.source;
        let same_target = after.target == ANY || after.target == target.target;
        if same_source && same_target {
            log.confirm(target);
            continue;
        }
        store.update(target, substitution, &mut log.record())?;
    }
    Ok(())
}

/// Delete what `restriction` selects. Returns the indices deleted directly.
fn delete_link<S: LinkStore + ?Sized>(
    store: &mut S,
    restriction: Link,
    log: &mut ExecutionLog,
) -> Result<Vec<Address>, LinkError> {
    let targets = if restriction.index == ANY {
        store.scan(restriction)?
    } else {
        store.get(restriction.index)?.into_iter().collect()
    };

    let mut deleted = Vec::new();
    for target in targets {
        if store.exists(target.index)? {
            store.delete(target, &mut log.record())?;
            deleted.push(target.index);
        }
    }
    Ok(deleted)
}

// =============================================================================
// PURE CREATION / DELETION
// =============================================================================

/// Create every substitution tree, reusing links whose content already
/// exists. Wildcards and variables cannot be created and are rejected before
/// anything is written.
pub fn create_patterns<S: LinkStore + ?Sized>(
    store: &mut S,
    patterns: &[Pattern],
    tracer: &dyn Tracer,
) -> Result<ExecutionLog, LinkError> {
    for pattern in patterns {
        check_creatable(pattern)?;
    }

    let mut log = ExecutionLog::default();
    for pattern in patterns {
        match pattern {
            Pattern::Leaf {
                id: Term::Literal(index),
            } => store.ensure_created(*index, &mut log.record())?,
            Pattern::Leaf { .. } => {}
            Pattern::Composite { .. } => {
                let index = ensure_tree(store, pattern, &mut log)?;
                tracer.event("executor", format_args!("{} -> {}", pattern, index));
            }
        }
    }
    Ok(log)
}

fn check_creatable(pattern: &Pattern) -> Result<(), LinkError> {
    match pattern {
        Pattern::Leaf {
            id: id @ (Term::Wildcard | Term::Variable(_)),
        } => Err(LinkError::InvalidPattern(format!(
            "cannot create a link from unresolved '{}'",
            id
        ))),
        Pattern::Leaf { .. } => Ok(()),
        Pattern::Composite { source, target, .. } => {
            check_creatable(source)?;
            check_creatable(target)
        }
    }
}

/// Ensure the tree exists bottom-up. Returns the address it resolves to.
fn ensure_tree<S: LinkStore + ?Sized>(
    store: &mut S,
    pattern: &Pattern,
    log: &mut ExecutionLog,
) -> Result<Address, LinkError> {
    match pattern {
        Pattern::Leaf { id } => match id {
            Term::Literal(address) => Ok(*address),
            Term::Unconstrained => Ok(NULL),
            Term::Wildcard | Term::Variable(_) => Err(LinkError::InvalidPattern(format!(
                "cannot create a link from unresolved '{}'",
                id
            ))),
        },
        Pattern::Composite { id, source, target } => {
            let source = ensure_tree(store, source, log)?;
            let target = ensure_tree(store, target, log)?;
            match id {
                Term::Literal(index) if *index != NULL => {
                    store.ensure_created(*index, &mut log.record())?;
                    store.update(
                        Link::new(*index, ANY, ANY),
                        Link::new(*index, source, target),
                        &mut log.record(),
                    )
                }
                _ => {
                    let (index, created) =
                        store.get_or_create(source, target, &mut log.record())?;
                    if !created {
                        log.confirm(Link::new(index, source, target));
                    }
                    Ok(index)
                }
            }
        }
    }
}

/// Delete every link the restriction patterns match, including links matched
/// by nested composites. All patterns are matched before anything is deleted.
pub fn delete_matching<S: LinkStore + ?Sized>(
    store: &mut S,
    patterns: &[Pattern],
    tracer: &dyn Tracer,
) -> Result<ExecutionLog, LinkError> {
    let mut witnesses = Vec::new();
    let mut seen = BTreeSet::new();
    for pattern in patterns {
        let matched = solver::matches(&*store, pattern, &Solution::default())?;
        tracer.event(
            "executor",
            format_args!("{} matched {} times", pattern, matched.len()),
        );
        for solution in matched {
            witnesses.extend(
                solution
                    .witnesses
                    .into_iter()
                    .filter(|index| seen.insert(*index)),
            );
        }
    }

    let mut log = ExecutionLog::default();
    for index in witnesses {
        if store.exists(index)? {
            store.delete(Link::empty(index), &mut log.record())?;
        }
    }
    Ok(log)
}
