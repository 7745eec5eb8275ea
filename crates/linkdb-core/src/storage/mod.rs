//! # Persistent Storage
//!
//! Disk-backed implementations of the `LinkStore` contract.

mod redb_links;

pub use redb_links::RedbLinks;
