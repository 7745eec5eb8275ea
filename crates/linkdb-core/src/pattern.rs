//! # Pattern Compiler
//!
//! Turns parsed expressions into `Pattern` trees.
//!
//! A node with no children compiles to a leaf, a node with exactly two
//! children to a composite (`source`, `target`). Any other shape degrades to
//! a leaf carrying the node's own id.

use crate::notation::Expr;
use crate::primitives::{ANY, NULL};
use crate::{Address, Link};
use std::collections::BTreeMap;
use std::fmt;

/// How a pattern id constrains an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Empty or absent id. Constrains nothing, binds nothing.
    Unconstrained,
    /// `*`: matches anything, binds nothing.
    Wildcard,
    /// `$name`: binds on first match, must agree afterwards.
    Variable(String),
    /// A decimal address.
    Literal(Address),
}

impl Term {
    /// Classify a raw id.
    ///
    /// Ids that are neither `*`, `$name` nor a decimal number do not name an
    /// address and are treated as unconstrained.
    #[must_use]
    pub fn parse(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            None | Some("") => Self::Unconstrained,
            Some("*") => Self::Wildcard,
            Some(name) if name.starts_with('$') && name.len() > 1 => {
                Self::Variable(name.to_string())
            }
            Some(digits) => digits
                .parse::<Address>()
                .ok()
                .filter(|address| *address != ANY)
                .map_or(Self::Unconstrained, Self::Literal),
        }
    }

    /// Resolve against bindings: variable lookup, literal value, else `ANY`.
    #[must_use]
    pub fn resolve(&self, bindings: &BTreeMap<String, Address>) -> Address {
        match self {
            Self::Literal(address) => *address,
            Self::Variable(name) => bindings.get(name).copied().unwrap_or(ANY),
            Self::Unconstrained | Self::Wildcard => ANY,
        }
    }

    /// The variable name, if this term is one.
    #[must_use]
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconstrained => Ok(()),
            Self::Wildcard => f.write_str("*"),
            Self::Variable(name) => f.write_str(name),
            Self::Literal(address) => write!(f, "{}", address),
        }
    }
}

/// A compiled pattern node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Leaf {
        id: Term,
    },
    Composite {
        id: Term,
        source: Box<Pattern>,
        target: Box<Pattern>,
    },
}

impl Pattern {
    /// Compile an expression. Never fails.
    #[must_use]
    pub fn compile(expr: &Expr) -> Self {
        let id = Term::parse(expr.id.as_deref());
        match expr.values.as_slice() {
            [source, target] => Self::Composite {
                id,
                source: Box::new(Self::compile(source)),
                target: Box::new(Self::compile(target)),
            },
            _ => Self::Leaf { id },
        }
    }

    /// The node's own id term.
    #[must_use]
    pub fn id(&self) -> &Term {
        match self {
            Self::Leaf { id } | Self::Composite { id, .. } => id,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Instantiate into a link under the given bindings.
    ///
    /// A leaf yields `(id: * *)`. A composite yields `(id: s t)` where each
    /// side is the child's resolved index, or `ANY` if that is null or unset.
    #[must_use]
    pub fn instantiate(&self, bindings: &BTreeMap<String, Address>) -> Link {
        match self {
            Self::Leaf { id } => Link::new(id.resolve(bindings), ANY, ANY),
            Self::Composite { id, source, target } => Link::new(
                id.resolve(bindings),
                side(source.instantiate(bindings).index),
                side(target.instantiate(bindings).index),
            ),
        }
    }
}

fn side(index: Address) -> Address {
    if index == NULL { ANY } else { index }
}

/// Renders back to notation, e.g. `($i: $s (1 *))`.
impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf { id } => write!(f, "{}", id),
            Self::Composite { id, source, target } => {
                f.write_str("(")?;
                if *id != Term::Unconstrained {
                    write!(f, "{}: ", id)?;
                }
                write!(f, "{} {})", source, target)
            }
        }
    }
}

/// True when every node in the expression has zero or two children.
///
/// The query dispatcher treats any other shape as a malformed query.
#[must_use]
pub fn is_well_formed(expr: &Expr) -> bool {
    match expr.values.as_slice() {
        [] => true,
        [source, target] => is_well_formed(source) && is_well_formed(target),
        _ => false,
    }
}

/// Compile each child of a side group, prepending the group's own id as a
/// leaf pattern when it has one.
#[must_use]
pub fn compile_side(side: &Expr) -> Vec<Pattern> {
    let mut patterns = Vec::with_capacity(side.values.len() + 1);
    if side.id.as_deref().is_some_and(|id| !id.is_empty()) {
        patterns.push(Pattern::Leaf {
            id: Term::parse(side.id.as_deref()),
        });
    }
    patterns.extend(side.values.iter().map(Pattern::compile));
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse;

    fn compile(text: &str) -> Pattern {
        Pattern::compile(&parse(text).expect("parse"))
    }

    #[test]
    fn term_classification() {
        assert_eq!(Term::parse(None), Term::Unconstrained);
        assert_eq!(Term::parse(Some("")), Term::Unconstrained);
        assert_eq!(Term::parse(Some("*")), Term::Wildcard);
        assert_eq!(Term::parse(Some("$x")), Term::Variable("$x".to_string()));
        assert_eq!(Term::parse(Some("42")), Term::Literal(42));
        assert_eq!(Term::parse(Some("name")), Term::Unconstrained);
        assert_eq!(Term::parse(Some("$")), Term::Unconstrained);
    }

    #[test]
    fn compiles_leaf_and_composite() {
        let pattern = compile("($i: $s (1 *))");
        let Pattern::Composite { id, source, target } = &pattern else {
            unreachable!("expected composite, got {pattern:?}");
        };
        assert_eq!(*id, Term::Variable("$i".to_string()));
        assert!(source.is_leaf());
        assert!(!target.is_leaf());
        assert_eq!(pattern.to_string(), "($i: $s (1 *))");
    }

    #[test]
    fn odd_shapes_degrade_to_leaf() {
        let pattern = compile("(7: 1 2 3)");
        assert_eq!(pattern, Pattern::Leaf { id: Term::Literal(7) });

        let expr = parse("((1 2 3) (4 5))").expect("parse");
        assert!(!is_well_formed(&expr));
        assert!(is_well_formed(&parse("((1 2) (4 5))").expect("parse")));
    }

    #[test]
    fn instantiation_resolves_bindings() {
        let pattern = compile("($i: $s ($t 2))");
        let bindings = BTreeMap::from([("$i".to_string(), 5), ("$s".to_string(), 1)]);
        // The nested composite has no id, so its side is unconstrained.
        assert_eq!(pattern.instantiate(&bindings), Link::new(5, 1, ANY));

        let leaf = compile("3");
        assert_eq!(leaf.instantiate(&BTreeMap::new()), Link::new(3, ANY, ANY));
    }

    #[test]
    fn side_group_id_is_prepended() {
        let side = parse("(*:)").expect("parse");
        let patterns = compile_side(&side);
        assert_eq!(patterns, vec![Pattern::Leaf { id: Term::Wildcard }]);
    }
}
