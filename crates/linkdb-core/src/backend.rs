//! # Storage Backends
//!
//! One `LinkStore` over either storage flavour:
//! - `InMemory`: uses the in-memory `Links` (fast, volatile unless explicitly saved)
//! - `Persistent`: uses `RedbLinks` for disk-backed ACID storage

use crate::storage::RedbLinks;
use crate::store::{LinkStore, Links, WriteHandler};
use crate::{Address, Link, LinkError};
use std::path::Path;

/// Storage backend for the engine.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory links (fast, volatile).
    InMemory(Links),
    /// Disk-backed links using redb (ACID, persistent).
    Persistent(RedbLinks),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Links::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbLinks (database handle) cannot be safely cloned; use `snapshot()`.

impl StorageBackend {
    /// Open or create a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        Ok(Self::Persistent(RedbLinks::open(path)?))
    }

    /// Check if the backend persists to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    /// An in-memory copy of the current content.
    #[must_use]
    pub fn snapshot(&self) -> Links {
        match self {
            Self::InMemory(links) => links.clone(),
            Self::Persistent(redb) => redb.to_links(),
        }
    }

    /// Replace the whole content, e.g. from an imported snapshot.
    pub fn replace_all(&mut self, links: Links) -> Result<(), LinkError> {
        match self {
            Self::InMemory(current) => {
                *current = links;
                Ok(())
            }
            Self::Persistent(redb) => redb.replace_all(links),
        }
    }
}

impl LinkStore for StorageBackend {
    fn get(&self, index: Address) -> Result<Option<Link>, LinkError> {
        match self {
            Self::InMemory(links) => links.get(index),
            Self::Persistent(redb) => redb.get(index),
        }
    }

    fn count(&self) -> Result<usize, LinkError> {
        match self {
            Self::InMemory(links) => links.count(),
            Self::Persistent(redb) => redb.count(),
        }
    }

    fn scan(&self, restriction: Link) -> Result<Vec<Link>, LinkError> {
        match self {
            Self::InMemory(links) => links.scan(restriction),
            Self::Persistent(redb) => redb.scan(restriction),
        }
    }

    fn search(&self, source: Address, target: Address) -> Result<Option<Address>, LinkError> {
        match self {
            Self::InMemory(links) => links.search(source, target),
            Self::Persistent(redb) => redb.search(source, target),
        }
    }

    fn create(&mut self, handler: &mut WriteHandler<'_>) -> Result<Address, LinkError> {
        match self {
            Self::InMemory(links) => links.create(handler),
            Self::Persistent(redb) => redb.create(handler),
        }
    }

    fn update(
        &mut self,
        restriction: Link,
        substitution: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        match self {
            Self::InMemory(links) => links.update(restriction, substitution, handler),
            Self::Persistent(redb) => redb.update(restriction, substitution, handler),
        }
    }

    fn delete(
        &mut self,
        restriction: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        match self {
            Self::InMemory(links) => links.delete(restriction, handler),
            Self::Persistent(redb) => redb.delete(restriction, handler),
        }
    }

    fn ensure_created(
        &mut self,
        index: Address,
        handler: &mut WriteHandler<'_>,
    ) -> Result<(), LinkError> {
        match self {
            Self::InMemory(links) => links.ensure_created(index, handler),
            Self::Persistent(redb) => redb.ensure_created(index, handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Flow;
    use tempfile::tempdir;

    fn fill(store: &mut StorageBackend) {
        let mut silent = |_: Link, _: Link| Flow::Continue;
        store.create_and_update(1, 1, &mut silent).expect("create");
        store.create_and_update(1, 2, &mut silent).expect("create");
    }

    #[test]
    fn default_is_in_memory() {
        let store = StorageBackend::default();
        assert!(!store.is_persistent());
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn both_backends_agree() {
        let temp = tempdir().expect("temp dir");
        let mut memory = StorageBackend::default();
        let mut persistent =
            StorageBackend::with_redb(temp.path().join("test.redb")).expect("open db");
        assert!(persistent.is_persistent());

        fill(&mut memory);
        fill(&mut persistent);

        assert_eq!(memory.all().expect("all"), persistent.all().expect("all"));
        assert_eq!(
            memory.snapshot().iter().count(),
            persistent.snapshot().iter().count()
        );
    }

    #[test]
    fn replace_all_swaps_content() {
        let mut store = StorageBackend::default();
        fill(&mut store);
        let replacement = Links::from_parts([Link::new(1, 1, 1)], 1).expect("from parts");
        store.replace_all(replacement).expect("replace");
        assert_eq!(store.all().expect("all"), vec![Link::new(1, 1, 1)]);
    }
}
