//! # redb-backed Link Storage
//!
//! A disk-backed link store using the redb embedded database.
//!
//! Reads are served from an in-memory `Links` mirror that also enforces the
//! uniqueness and usage invariants. Every mutation records the addresses its
//! events touched and writes exactly those rows, plus the allocation mark,
//! in one ACID write transaction.
//!
//! If a write transaction fails the mirror is reloaded from disk, so memory
//! never runs ahead of what was committed.

use crate::store::{LinkStore, Links, WriteHandler};
use crate::{Address, Flow, Link, LinkError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for links: index(u64) -> (source, target)
const LINKS: TableDefinition<u64, (u64, u64)> = TableDefinition::new("links");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Metadata key holding the allocation high-water mark.
const ALLOCATED_KEY: &str = "allocated";

/// A disk-backed link store using redb.
pub struct RedbLinks {
    /// The redb database handle.
    db: Database,
    /// In-memory mirror of the committed links.
    mirror: Links,
}

impl std::fmt::Debug for RedbLinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLinks")
            .field("links", &self.mirror.iter().count())
            .field("allocated", &self.mirror.allocated())
            .finish_non_exhaustive()
    }
}

impl RedbLinks {
    /// Open or create a link database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        let db = Database::create(path.as_ref()).map_err(|e| LinkError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(LINKS)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| LinkError::IoError(e.to_string()))?;
        }

        let mirror = Self::load(&db)?;
        Ok(Self { db, mirror })
    }

    /// Replace the whole content of the database with `links`.
    ///
    /// Used by snapshot import; runs as a single transaction.
    pub fn replace_all(&mut self, links: Links) -> Result<(), LinkError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| LinkError::IoError(e.to_string()))?;
        {
            let mut links_table = write_txn
                .open_table(LINKS)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            links_table
                .retain(|_, _| false)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            for link in links.iter() {
                links_table
                    .insert(link.index, (link.source, link.target))
                    .map_err(|e| LinkError::IoError(e.to_string()))?;
            }
            let mut meta_table = write_txn
                .open_table(METADATA)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            meta_table
                .insert(ALLOCATED_KEY, links.allocated())
                .map_err(|e| LinkError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| LinkError::IoError(e.to_string()))?;

        self.mirror = links;
        Ok(())
    }

    /// A copy of the in-memory view of the committed links.
    pub fn to_links(&self) -> Links {
        self.mirror.clone()
    }

    fn load(db: &Database) -> Result<Links, LinkError> {
        let read_txn = db
            .begin_read()
            .map_err(|e| LinkError::IoError(e.to_string()))?;

        let allocated = {
            let table = read_txn
                .open_table(METADATA)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            table
                .get(ALLOCATED_KEY)
                .map_err(|e| LinkError::IoError(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        let table = read_txn
            .open_table(LINKS)
            .map_err(|e| LinkError::IoError(e.to_string()))?;
        let mut links = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| LinkError::IoError(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| LinkError::IoError(e.to_string()))?;
            let (source, target) = value.value();
            links.push(Link::new(key.value(), source, target));
        }

        Links::from_parts(links, allocated)
    }

    /// Write the current mirror rows of `touched` addresses to disk.
    fn persist(&mut self, touched: &BTreeSet<Address>) -> Result<(), LinkError> {
        let committed = self.write_rows(touched);
        if committed.is_err() {
            self.mirror = Self::load(&self.db)?;
        }
        committed
    }

    fn write_rows(&self, touched: &BTreeSet<Address>) -> Result<(), LinkError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| LinkError::IoError(e.to_string()))?;
        {
            let mut links_table = write_txn
                .open_table(LINKS)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            for index in touched {
                match self.mirror.get(*index)? {
                    Some(link) => {
                        links_table
                            .insert(link.index, (link.source, link.target))
                            .map_err(|e| LinkError::IoError(e.to_string()))?;
                    }
                    None => {
                        links_table
                            .remove(*index)
                            .map_err(|e| LinkError::IoError(e.to_string()))?;
                    }
                }
            }
            let mut meta_table = write_txn
                .open_table(METADATA)
                .map_err(|e| LinkError::IoError(e.to_string()))?;
            meta_table
                .insert(ALLOCATED_KEY, self.mirror.allocated())
                .map_err(|e| LinkError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| LinkError::IoError(e.to_string()))
    }

    /// Run a mirror mutation while recording the addresses its events touch,
    /// then commit those rows.
    fn mutate<T>(
        &mut self,
        handler: &mut WriteHandler<'_>,
        op: impl FnOnce(&mut Links, &mut WriteHandler<'_>) -> Result<T, LinkError>,
    ) -> Result<T, LinkError> {
        let mut touched = BTreeSet::new();
        let result = {
            let mut record = |before: Link, after: Link| -> Flow {
                touched.insert(before.index);
                touched.insert(after.index);
                handler(before, after)
            };
            op(&mut self.mirror, &mut record)
        };
        touched.remove(&crate::primitives::NULL);
        self.persist(&touched)?;
        result
    }
}

impl LinkStore for RedbLinks {
    fn get(&self, index: Address) -> Result<Option<Link>, LinkError> {
        self.mirror.get(index)
    }

    fn count(&self) -> Result<usize, LinkError> {
        self.mirror.count()
    }

    fn scan(&self, restriction: Link) -> Result<Vec<Link>, LinkError> {
        self.mirror.scan(restriction)
    }

    fn search(&self, source: Address, target: Address) -> Result<Option<Address>, LinkError> {
        self.mirror.search(source, target)
    }

    fn create(&mut self, handler: &mut WriteHandler<'_>) -> Result<Address, LinkError> {
        self.mutate(handler, |links, record| links.create(record))
    }

    fn update(
        &mut self,
        restriction: Link,
        substitution: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        self.mutate(handler, |links, record| {
            links.update(restriction, substitution, record)
        })
    }

    fn delete(
        &mut self,
        restriction: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        self.mutate(handler, |links, record| links.delete(restriction, record))
    }

    fn ensure_created(
        &mut self,
        index: Address,
        handler: &mut WriteHandler<'_>,
    ) -> Result<(), LinkError> {
        // The intermediates never reach disk: only the target row changes.
        self.mutate(handler, |links, record| links.ensure_created(index, record))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn silent() -> impl FnMut(Link, Link) -> Flow {
        |_, _| Flow::Continue
    }

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let mut store = RedbLinks::open(&db_path).expect("open db");

        let a = store.create_and_update(1, 1, &mut silent()).expect("create");
        let b = store.create_and_update(1, 2, &mut silent()).expect("create");

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(store.count().expect("count"), 2);
        assert_eq!(store.search(1, 2).expect("search"), Some(2));
    }

    #[test]
    fn persistence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        // Create and populate
        {
            let mut store = RedbLinks::open(&db_path).expect("open db");
            store.create_and_update(1, 1, &mut silent()).expect("create");
            store.create_and_update(2, 2, &mut silent()).expect("create");
        }

        // Reopen and verify
        {
            let store = RedbLinks::open(&db_path).expect("open db");
            assert_eq!(
                store.all().expect("all"),
                vec![Link::new(1, 1, 1), Link::new(2, 2, 2)]
            );
        }
    }

    #[test]
    fn recovery_free_addresses_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbLinks::open(&db_path).expect("open db");
            for value in 1..=3 {
                store
                    .create_and_update(value, value, &mut silent())
                    .expect("create");
            }
            store.delete(Link::empty(2), &mut silent()).expect("delete");
        }

        {
            let mut store = RedbLinks::open(&db_path).expect("reopen db");
            assert_eq!(store.count().expect("count"), 2);
            assert_eq!(store.create(&mut silent()).expect("create"), 2);
            assert_eq!(store.create(&mut silent()).expect("create"), 4);
        }
    }

    #[test]
    fn recovery_merge_persists() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbLinks::open(&db_path).expect("open db");
            store.create_and_update(1, 1, &mut silent()).expect("create");
            store.create_and_update(2, 2, &mut silent()).expect("create");
            store
                .update(Link::empty(1), Link::new(1, 2, 2), &mut silent())
                .expect("update");
        }

        {
            let store = RedbLinks::open(&db_path).expect("reopen db");
            assert_eq!(store.all().expect("all"), vec![Link::new(2, 2, 2)]);
        }
    }

    #[test]
    fn recovery_ensure_created_keeps_gap_free() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbLinks::open(&db_path).expect("open db");
            store.ensure_created(3, &mut silent()).expect("ensure");
            store
                .update(Link::empty(3), Link::new(3, 3, 3), &mut silent())
                .expect("update");
        }

        {
            let mut store = RedbLinks::open(&db_path).expect("reopen db");
            assert_eq!(store.all().expect("all"), vec![Link::new(3, 3, 3)]);
            assert_eq!(store.create(&mut silent()).expect("create"), 1);
        }
    }

    #[test]
    fn recovery_multiple_reopen_cycles() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        for cycle in 1..=3 {
            let mut store = RedbLinks::open(&db_path).expect("open db");
            assert_eq!(store.count().expect("count"), cycle - 1);
            let value = cycle as u64;
            store
                .create_and_update(value, value, &mut silent())
                .expect("create");
        }

        let store = RedbLinks::open(&db_path).expect("open db");
        assert_eq!(store.count().expect("count"), 3);
    }

    #[test]
    fn replace_all_overwrites_content() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbLinks::open(&db_path).expect("open db");
            store.create_and_update(1, 1, &mut silent()).expect("create");
            let replacement =
                Links::from_parts([Link::new(5, 5, 5)], 5).expect("from parts");
            store.replace_all(replacement).expect("replace");
        }

        let store = RedbLinks::open(&db_path).expect("open db");
        assert_eq!(store.all().expect("all"), vec![Link::new(5, 5, 5)]);
    }

    #[test]
    fn events_are_forwarded() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let mut store = RedbLinks::open(&db_path).expect("open db");

        let mut seen = 0;
        store
            .create_and_update(1, 1, &mut |_, _| {
                seen += 1;
                Flow::Continue
            })
            .expect("create");
        assert_eq!(seen, 2);
    }
}
