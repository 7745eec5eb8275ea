//! # linkdb-core
//!
//! An associative triple store and its declarative update language.
//!
//! Every stored link is a triple `(index: source target)` of addresses.
//! Queries are written as two pattern lists, a restriction describing what
//! must match and a substitution describing what it should become:
//!
//! ```text
//! (($i: $s $t)) (($i: $t $s))
//! ```
//!
//! The engine compiles both sides, finds every solution of the restriction,
//! plans the difference per solution and applies it, then reports the raw
//! change log. `simplify` reduces that log to the minimal transitions.
//!
//! ## Architectural Constraints
//!
//! - Synchronous: a query runs to completion with exclusive store access
//! - Deterministic: ordered collections only, no floats, no randomness
//! - No logging dependency: the engine reports through an injected `Tracer`
//! - Stores own their consistency rules; the engine observes and corrects

// =============================================================================
// MODULES
// =============================================================================

pub mod backend;
pub mod executor;
pub mod formats;
pub mod notation;
pub mod pattern;
pub mod planner;
pub mod primitives;
pub mod query;
pub mod simplifier;
pub mod solver;
pub mod storage;
pub mod store;
pub mod trace;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Address, Change, Flow, Link, LinkError};

// =============================================================================
// RE-EXPORTS: Stores
// =============================================================================

pub use backend::StorageBackend;
pub use storage::RedbLinks;
pub use store::{LinkStore, Links, WriteHandler};

// =============================================================================
// RE-EXPORTS: Query Engine
// =============================================================================

pub use notation::{Expr, parse};
pub use pattern::{Pattern, Term};
pub use planner::{Operation, Plan};
pub use query::QueryProcessor;
pub use simplifier::simplify;
pub use solver::Solution;
pub use trace::{NoopTracer, Tracer};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, format_structure, links_from_bytes, links_to_bytes};
