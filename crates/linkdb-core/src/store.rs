//! # Link Store
//!
//! The triple storage for the linkdb CORE.
//!
//! This module defines the `LinkStore` trait consumed by the query engine and
//! implements it for the in-memory `Links` store.
//! All data structures use `BTreeMap` for deterministic ordering.
//!
//! ## Store-driven side effects
//!
//! Every store keeps two invariants on its own, and the engine has to live
//! with the writes they cause:
//! - **Uniqueness**: at most one link per non-empty `(source, target)` pair.
//!   Updating a link onto content that already exists elsewhere merges it
//!   into the existing link and deletes it.
//! - **Cascading usages**: deleting a link first deletes every link that uses
//!   it as source or target.

use crate::primitives::{ANY, MAX_ENSURE_CREATED_GAP, NULL};
use crate::{Address, Flow, Link, LinkError};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

/// Callback invoked once per elementary write with `(before, after)`.
pub type WriteHandler<'a> = dyn FnMut(Link, Link) -> Flow + 'a;

// =============================================================================
// LINKSTORE TRAIT
// =============================================================================

/// The LinkStore trait defines the store contract used by the engine.
///
/// All fallible operations return `Result<T, LinkError>` to support both
/// in-memory and persistent storage backends uniformly.
pub trait LinkStore {
    /// Get a link by its index.
    fn get(&self, index: Address) -> Result<Option<Link>, LinkError>;

    /// Get the total number of stored links.
    fn count(&self) -> Result<usize, LinkError>;

    /// All links matching a restriction (`ANY` fields match anything), in
    /// ascending index order.
    fn scan(&self, restriction: Link) -> Result<Vec<Link>, LinkError>;

    /// Find the link holding the given content.
    fn search(&self, source: Address, target: Address) -> Result<Option<Address>, LinkError>;

    /// Allocate a new empty link `(i: 0 0)`. Returns its index.
    fn create(&mut self, handler: &mut WriteHandler<'_>) -> Result<Address, LinkError>;

    /// Rewrite the link selected by `restriction.index` with the substitution's
    /// source and target. `ANY` in the substitution keeps the stored value.
    ///
    /// Returns the index that now holds the content: a different index when
    /// the content already existed and the link was merged into it.
    fn update(
        &mut self,
        restriction: Link,
        substitution: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError>;

    /// Delete the link selected by `restriction.index`, after deleting every
    /// link that uses it.
    fn delete(
        &mut self,
        restriction: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError>;

    /// Check if a link exists.
    fn exists(&self, index: Address) -> Result<bool, LinkError> {
        Ok(self.get(index)?.is_some())
    }

    /// Every stored link in ascending index order.
    fn all(&self) -> Result<Vec<Link>, LinkError> {
        self.scan(Link::ANY)
    }

    /// Delete every link matching the restriction.
    ///
    /// Stops before the next matched link once the handler returns
    /// `Flow::Break`. Returns the number of matched links deleted.
    fn delete_all(
        &mut self,
        restriction: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<usize, LinkError> {
        let stopped = Cell::new(false);
        let mut forward = |before: Link, after: Link| {
            let flow = handler(before, after);
            if flow.is_break() {
                stopped.set(true);
            }
            flow
        };

        let mut deleted = 0;
        for link in self.scan(restriction)? {
            if stopped.get() {
                break;
            }
            // An earlier cascade may already have removed it.
            if self.exists(link.index)? {
                self.delete(link, &mut forward)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Create a link and set its content in one step.
    fn create_and_update(
        &mut self,
        source: Address,
        target: Address,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        let index = self.create(handler)?;
        self.update(
            Link::new(index, ANY, ANY),
            Link::new(index, source, target),
            handler,
        )
    }

    /// Return the link holding `(source, target)`, creating it if needed.
    ///
    /// The flag is true when a new link was created.
    fn get_or_create(
        &mut self,
        source: Address,
        target: Address,
        handler: &mut WriteHandler<'_>,
    ) -> Result<(Address, bool), LinkError> {
        if let Some(existing) = self.search(source, target)? {
            return Ok((existing, false));
        }
        let index = self.create_and_update(source, target, handler)?;
        Ok((index, true))
    }

    /// Make sure a link exists at exactly `index`.
    ///
    /// Allocates links until `index` is reached, then releases the
    /// intermediates. Only the creation of `index` itself is reported.
    fn ensure_created(
        &mut self,
        index: Address,
        handler: &mut WriteHandler<'_>,
    ) -> Result<(), LinkError> {
        if index == NULL || index == ANY {
            return Err(LinkError::InvalidPattern(format!(
                "cannot create a link at reserved address {}",
                Link::new(index, NULL, NULL)
            )));
        }
        if self.exists(index)? {
            return Ok(());
        }

        let mut silent = |_: Link, _: Link| Flow::Continue;
        let mut intermediates = Vec::new();
        loop {
            let mut events = Vec::new();
            let created = self.create(&mut |before: Link, after: Link| {
                events.push((before, after));
                Flow::Continue
            })?;
            if created == index {
                for (before, after) in events {
                    handler(before, after);
                }
                break;
            }
            intermediates.push(created);
            if intermediates.len() as u64 > MAX_ENSURE_CREATED_GAP {
                for intermediate in intermediates.iter().rev() {
                    self.delete(Link::empty(*intermediate), &mut silent)?;
                }
                return Err(LinkError::InvalidPattern(format!(
                    "address {} is too far beyond the allocated range",
                    index
                )));
            }
        }

        for intermediate in intermediates.iter().rev() {
            self.delete(Link::empty(*intermediate), &mut silent)?;
        }
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY IMPLEMENTATION
// =============================================================================

/// The in-memory link store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct Links {
    /// Link storage: index -> link
    links: BTreeMap<Address, Link>,

    /// Uniqueness index: (source, target) -> index, non-empty links only
    by_content: BTreeMap<(Address, Address), Address>,

    /// Usage index: referenced address -> links using it as source or target
    usages: BTreeMap<Address, BTreeSet<Address>>,

    /// Released addresses below the allocation mark
    free: BTreeSet<Address>,

    /// Highest allocated address
    allocated: Address,
}

impl Links {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from stored links and the allocation mark.
    ///
    /// Addresses up to `allocated` that hold no link become free. A mark
    /// further past the highest link than `ensure_created` could ever reach
    /// is rejected.
    pub fn from_parts(
        links: impl IntoIterator<Item = Link>,
        allocated: Address,
    ) -> Result<Self, LinkError> {
        let mut store = Self::new();
        for link in links {
            if link.index == NULL || link.index == ANY || link.index > allocated {
                return Err(LinkError::SerializationError(format!(
                    "link {} outside allocated range 1..={}",
                    link, allocated
                )));
            }
            if link.source == ANY || link.target == ANY {
                return Err(LinkError::SerializationError(format!(
                    "link {} stores a wildcard",
                    link
                )));
            }
            if !link.is_empty() && store.by_content.contains_key(&(link.source, link.target)) {
                return Err(LinkError::SerializationError(format!(
                    "duplicate content in link {}",
                    link
                )));
            }
            store.insert_link(link);
        }
        let highest = store.links.keys().next_back().copied().unwrap_or(NULL);
        if allocated - highest > MAX_ENSURE_CREATED_GAP {
            return Err(LinkError::SerializationError(format!(
                "allocation mark {} is {} addresses past the highest link {}",
                allocated,
                allocated - highest,
                highest
            )));
        }
        store.allocated = allocated;
        store.free = (1..=allocated)
            .filter(|index| !store.links.contains_key(index))
            .collect();
        Ok(store)
    }

    /// Highest allocated address.
    #[must_use]
    pub fn allocated(&self) -> Address {
        self.allocated
    }

    /// All links in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Links (other than `index` itself) that use `index` as source or target.
    fn users_of(&self, index: Address) -> Vec<Address> {
        self.usages
            .get(&index)
            .map(|users| users.iter().copied().filter(|u| *u != index).collect())
            .unwrap_or_default()
    }

    fn insert_link(&mut self, link: Link) {
        if !link.is_empty() {
            self.by_content.insert((link.source, link.target), link.index);
        }
        for referenced in [link.source, link.target] {
            if referenced != NULL {
                self.usages.entry(referenced).or_default().insert(link.index);
            }
        }
        self.links.insert(link.index, link);
    }

    fn remove_link(&mut self, index: Address) -> Option<Link> {
        let link = self.links.remove(&index)?;
        if !link.is_empty() && self.by_content.get(&(link.source, link.target)) == Some(&index) {
            self.by_content.remove(&(link.source, link.target));
        }
        for referenced in [link.source, link.target] {
            if let Some(users) = self.usages.get_mut(&referenced) {
                users.remove(&index);
                if users.is_empty() {
                    self.usages.remove(&referenced);
                }
            }
        }
        Some(link)
    }

    fn allocate(&mut self) -> Result<Address, LinkError> {
        if let Some(index) = self.free.pop_first() {
            return Ok(index);
        }
        if self.allocated >= ANY - 1 {
            return Err(LinkError::StorageExhausted);
        }
        self.allocated += 1;
        Ok(self.allocated)
    }

    fn release(&mut self, index: Address) {
        if index != self.allocated {
            self.free.insert(index);
            return;
        }
        self.allocated -= 1;
        while self.allocated > 0 && self.free.remove(&self.allocated) {
            self.allocated -= 1;
        }
    }

    /// Remove one link with no cascade, reporting the two delete events.
    fn erase(&mut self, index: Address, handler: &mut WriteHandler<'_>) {
        let Some(link) = self.remove_link(index) else {
            return;
        };
        self.release(index);
        if !link.is_empty() {
            handler(link, Link::empty(index));
        }
        handler(Link::empty(index), Link::NULL);
    }

    /// Move every usage of `old` onto `new`, then delete `old`.
    fn merge(
        &mut self,
        old: Address,
        new: Address,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        for user in self.users_of(old) {
            // A previous rewrite may have merged or cascaded this user away.
            let Some(link) = self.links.get(&user).copied() else {
                continue;
            };
            let source = if link.source == old { new } else { link.source };
            let target = if link.target == old { new } else { link.target };
            self.update(link, Link::new(user, source, target), handler)?;
        }
        if self.links.contains_key(&old) {
            self.delete(Link::empty(old), handler)?;
        }
        Ok(new)
    }
}

impl LinkStore for Links {
    fn get(&self, index: Address) -> Result<Option<Link>, LinkError> {
        Ok(self.links.get(&index).copied())
    }

    fn count(&self) -> Result<usize, LinkError> {
        Ok(self.links.len())
    }

    fn scan(&self, restriction: Link) -> Result<Vec<Link>, LinkError> {
        if restriction.index != ANY {
            return Ok(self
                .links
                .get(&restriction.index)
                .filter(|link| link.matches(&restriction))
                .copied()
                .into_iter()
                .collect());
        }
        if restriction.source != ANY && restriction.target != ANY {
            // Empty content is not unique, so it cannot use the index.
            if restriction.source != NULL || restriction.target != NULL {
                return Ok(self
                    .by_content
                    .get(&(restriction.source, restriction.target))
                    .and_then(|index| self.links.get(index))
                    .copied()
                    .into_iter()
                    .collect());
            }
        }
        let narrowed = [restriction.source, restriction.target]
            .into_iter()
            .find(|side| *side != ANY && *side != NULL);
        let found = match narrowed {
            Some(referenced) => self
                .usages
                .get(&referenced)
                .into_iter()
                .flatten()
                .filter_map(|index| self.links.get(index))
                .filter(|link| link.matches(&restriction))
                .copied()
                .collect(),
            None => self
                .links
                .values()
                .filter(|link| link.matches(&restriction))
                .copied()
                .collect(),
        };
        Ok(found)
    }

    fn search(&self, source: Address, target: Address) -> Result<Option<Address>, LinkError> {
        if source == NULL && target == NULL {
            return Ok(None);
        }
        Ok(self.by_content.get(&(source, target)).copied())
    }

    fn create(&mut self, handler: &mut WriteHandler<'_>) -> Result<Address, LinkError> {
        let index = self.allocate()?;
        let link = Link::empty(index);
        self.insert_link(link);
        handler(Link::NULL, link);
        Ok(index)
    }

    fn update(
        &mut self,
        restriction: Link,
        substitution: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        let index = restriction.index;
        let before = self
            .links
            .get(&index)
            .copied()
            .ok_or(LinkError::NotFound(index))?;
        let source = if substitution.source == ANY {
            before.source
        } else {
            substitution.source
        };
        let target = if substitution.target == ANY {
            before.target
        } else {
            substitution.target
        };
        if source == before.source && target == before.target {
            return Ok(index);
        }
        if let Some(existing) = self.search(source, target)? {
            if existing != index {
                return self.merge(index, existing, handler);
            }
        }

        let after = Link::new(index, source, target);
        self.remove_link(index);
        self.insert_link(after);
        handler(before, after);
        Ok(index)
    }

    fn delete(
        &mut self,
        restriction: Link,
        handler: &mut WriteHandler<'_>,
    ) -> Result<Address, LinkError> {
        let root = restriction.index;
        if !self.links.contains_key(&root) {
            return Err(LinkError::NotFound(root));
        }

        // Collect every transitive user, then erase users before what they use.
        let mut order = vec![root];
        let mut seen = BTreeSet::from([root]);
        let mut cursor = 0;
        while cursor < order.len() {
            for user in self.users_of(order[cursor]) {
                if seen.insert(user) {
                    order.push(user);
                }
            }
            cursor += 1;
        }
        for index in order.into_iter().rev() {
            self.erase(index, handler);
        }
        Ok(root)
    }
}

// =============================================================================
// TESTS
// =============================================================================
