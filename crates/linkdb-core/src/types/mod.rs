//! # Core Type Definitions
//!
//! This module contains the core types shared by the stores and the engine:
//! - The address space (`Address`)
//! - The stored triple (`Link`)
//! - Raw change events (`Change`) and the write-handler signal (`Flow`)
//! - Error types (`LinkError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use crate::primitives::{ANY, NULL};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ADDRESS
// =============================================================================

/// An address in the link space. `0` is Null, `u64::MAX` is Any.
pub type Address = u64;

// =============================================================================
// LINK
// =============================================================================

/// A stored triple: `index` names the link, `source` and `target` reference
/// other links (or itself).
///
/// Field order matters: the derived `Ord` sorts by index, then source, then
/// target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Link {
    /// The link's own address.
    pub index: Address,
    /// The address this link starts from.
    pub source: Address,
    /// The address this link points to.
    pub target: Address,
}

impl Link {
    /// The null triple `(0: 0 0)`, used as the "absent" side of a change.
    pub const NULL: Self = Self::new(NULL, NULL, NULL);

    /// The all-wildcard restriction `(*: * *)`.
    pub const ANY: Self = Self::new(ANY, ANY, ANY);

    /// Create a new link.
    #[must_use]
    pub const fn new(index: Address, source: Address, target: Address) -> Self {
        Self {
            index,
            source,
            target,
        }
    }

    /// An allocated link with both sides empty: `(i: 0 0)`.
    #[must_use]
    pub const fn empty(index: Address) -> Self {
        Self::new(index, NULL, NULL)
    }

    /// True for the null triple `(0: 0 0)`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.index == NULL && self.source == NULL && self.target == NULL
    }

    /// True when both sides are empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.source == NULL && self.target == NULL
    }

    /// True for a point: a link whose source and target are itself.
    #[must_use]
    pub const fn is_point(&self) -> bool {
        self.index == self.source && self.source == self.target
    }

    /// True when every field is concrete (neither Null nor Any on the index,
    /// no Any on the sides).
    #[must_use]
    pub const fn is_concrete(&self) -> bool {
        self.index != NULL && self.index != ANY && self.source != ANY && self.target != ANY
    }

    /// Check whether this stored link satisfies a restriction where `ANY`
    /// fields match anything.
    #[must_use]
    pub const fn matches(&self, restriction: &Self) -> bool {
        (restriction.index == ANY || restriction.index == self.index)
            && (restriction.source == ANY || restriction.source == self.source)
            && (restriction.target == ANY || restriction.target == self.target)
    }
}

/// Renders as `(index: source target)`, with `*` for `ANY`.
impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}: {} {})",
            Slot(self.index),
            Slot(self.source),
            Slot(self.target)
        )
    }
}

struct Slot(Address);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == ANY {
            f.write_str("*")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// =============================================================================
// CHANGE EVENTS
// =============================================================================

/// A raw `(before, after)` transition reported by a store write.
///
/// Absence on either side is the null triple (`Link::NULL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Change {
    pub before: Link,
    pub after: Link,
}

impl Change {
    /// Create a new change.
    #[must_use]
    pub const fn new(before: Link, after: Link) -> Self {
        Self { before, after }
    }

    /// A confirmation: the link was read, not written.
    #[must_use]
    pub const fn confirm(link: Link) -> Self {
        Self::new(link, link)
    }

    /// True when before and after are identical.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.before == self.after
    }

    /// True when an existing index ends up at the null index.
    #[must_use]
    pub const fn is_deletion(&self) -> bool {
        self.before.index != NULL && self.after.index == NULL
    }

    /// The `before` side as an option (`None` for the null triple).
    #[must_use]
    pub const fn before_link(&self) -> Option<Link> {
        if self.before.is_null() {
            None
        } else {
            Some(self.before)
        }
    }

    /// The `after` side as an option (`None` for the null triple).
    #[must_use]
    pub const fn after_link(&self) -> Option<Link> {
        if self.after.is_null() {
            None
        } else {
            Some(self.after)
        }
    }
}

/// Renders as `((before) (after))`, with `()` for an absent side.
impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        match self.before_link() {
            Some(link) => write!(f, "{}", link)?,
            None => f.write_str("()")?,
        }
        f.write_str(" ")?;
        match self.after_link() {
            Some(link) => write!(f, "{}", link)?,
            None => f.write_str("()")?,
        }
        f.write_str(")")
    }
}

/// Signal returned by a write handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep going.
    #[default]
    Continue,
    /// Stop the current bulk or cascading operation before its next write.
    Break,
}

impl Flow {
    /// True for `Flow::Break`.
    #[must_use]
    pub const fn is_break(self) -> bool {
        matches!(self, Self::Break)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in linkdb.
///
/// - No silent failures
/// - Use `Result<T, LinkError>` for fallible operations
/// - No-op queries and empty matches are not errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// The addressed link does not exist.
    #[error("Link not found: {0}")]
    NotFound(Address),

    /// A pattern cannot be turned into a store write.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// The query text is not valid notation.
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage backend error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The address space is exhausted.
    #[error("Address space exhausted")]
    StorageExhausted,
}

// =============================================================================
// TESTS
// =============================================================================
