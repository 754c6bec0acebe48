//! In-memory entry cache with observer notifications.
//!
//! The store is owned by the application root and passed by reference to the
//! components that read or write it. Every public mutating method is one
//! batch: subscribers are called exactly once, synchronously, after the batch
//! has been fully applied, so a subscriber always sees a consistent snapshot.

use super::types::{Entry, EntryId, EntryPatch};
use std::collections::HashMap;

/// Handle returned by [`EntryStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Description of a completed mutation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// Entries inserted or overwritten by a server page.
    Upserted(Vec<EntryId>),
    /// Local patch applied to the listed entries.
    Mutated(Vec<EntryId>),
    /// Entire contents replaced by a full refresh.
    Replaced,
    /// Store emptied (context switch).
    Cleared,
}

type Subscriber = Box<dyn FnMut(&StoreChange, u64) + Send>;

/// Fields of an entry that currently have an optimistic mutation in flight.
#[derive(Debug, Clone, Copy, Default)]
struct PendingFields {
    status: u32,
    starred: u32,
}

impl PendingFields {
    fn is_empty(&self) -> bool {
        self.status == 0 && self.starred == 0
    }
}

/// Which mutable field a pending marker refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingField {
    Status,
    Starred,
}

pub struct EntryStore {
    entries: HashMap<EntryId, Entry>,
    pending: HashMap<EntryId, PendingFields>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    revision: u64,
}

impl EntryStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            pending: HashMap::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            revision: 0,
        }
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic counter bumped once per mutation batch.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Look up several ids, skipping any that are not cached.
    pub fn get_many<'a>(&'a self, ids: &'a [EntryId]) -> impl Iterator<Item = &'a Entry> + 'a {
        ids.iter().filter_map(move |id| self.entries.get(id))
    }

    /// Register a callback invoked after every mutation batch.
    ///
    /// The callback receives the change and the store revision it produced.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&StoreChange, u64) + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    // ------------------------------------------------------------------------
    // Pending optimistic fields
    // ------------------------------------------------------------------------

    /// Mark a field of `id` as having an optimistic mutation in flight.
    ///
    /// While marked, server pages merged through `upsert_many` or
    /// `replace_all` do not overwrite that field.
    pub fn begin_pending(&mut self, id: EntryId, field: PendingField) {
        let pending = self.pending.entry(id).or_default();
        match field {
            PendingField::Status => pending.status += 1,
            PendingField::Starred => pending.starred += 1,
        }
    }

    /// Release a marker set by `begin_pending`.
    pub fn end_pending(&mut self, id: EntryId, field: PendingField) {
        if let Some(pending) = self.pending.get_mut(&id) {
            match field {
                PendingField::Status => pending.status = pending.status.saturating_sub(1),
                PendingField::Starred => pending.starred = pending.starred.saturating_sub(1),
            }
            if pending.is_empty() {
                self.pending.remove(&id);
            }
        }
    }

    pub fn is_pending(&self, id: EntryId, field: PendingField) -> bool {
        self.pending.get(&id).is_some_and(|p| match field {
            PendingField::Status => p.status > 0,
            PendingField::Starred => p.starred > 0,
        })
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Merge server entries by id.
    ///
    /// New payloads overwrite old ones except for fields with a pending
    /// optimistic mutation, which keep their local value. Ids already present
    /// are updated in place; nothing is ever duplicated.
    pub fn upsert_many(&mut self, entries: Vec<Entry>) {
        if entries.is_empty() {
            return;
        }
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(entry.id);
            self.merge_one(entry);
        }
        self.notify(StoreChange::Upserted(ids));
    }

    /// Replace the whole cache with a fresh server snapshot.
    pub fn replace_all(&mut self, entries: Vec<Entry>) {
        let mut previous = std::mem::take(&mut self.entries);
        for mut entry in entries {
            if let Some(old) = previous.remove(&entry.id) {
                self.preserve_pending(&old, &mut entry);
            }
            self.entries.insert(entry.id, entry);
        }
        self.notify(StoreChange::Replaced);
    }

    /// Apply a local patch to one entry.
    ///
    /// Returns the previous values of the patched fields, or `None` if the
    /// entry is not cached (no notification is sent in that case).
    pub fn mutate(&mut self, id: EntryId, patch: EntryPatch) -> Option<EntryPatch> {
        let entry = self.entries.get_mut(&id)?;
        let previous = EntryPatch {
            status: patch.status.map(|_| entry.status),
            starred: patch.starred.map(|_| entry.starred),
        };
        entry.apply(&patch);
        self.notify(StoreChange::Mutated(vec![id]));
        Some(previous)
    }

    /// Apply the same patch to many entries as a single batch.
    ///
    /// Returns the ids that were actually cached and patched.
    pub fn mutate_many<I>(&mut self, ids: I, patch: EntryPatch) -> Vec<EntryId>
    where
        I: IntoIterator<Item = EntryId>,
    {
        let mut touched = Vec::new();
        for id in ids {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.apply(&patch);
                touched.push(id);
            }
        }
        if !touched.is_empty() {
            self.notify(StoreChange::Mutated(touched.clone()));
        }
        touched
    }

    /// Patch every cached entry. Used by the bulk "mark all as read".
    pub fn mutate_all(&mut self, patch: EntryPatch) -> Vec<EntryId> {
        let ids: Vec<EntryId> = self.entries.keys().copied().collect();
        self.mutate_many(ids, patch)
    }

    /// Drop every entry and pending marker.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.notify(StoreChange::Cleared);
    }

    fn merge_one(&mut self, mut incoming: Entry) {
        if let Some(existing) = self.entries.get(&incoming.id) {
            self.preserve_pending(existing, &mut incoming);
        }
        self.entries.insert(incoming.id, incoming);
    }

    fn preserve_pending(&self, local: &Entry, incoming: &mut Entry) {
        if self.is_pending(local.id, PendingField::Status) {
            incoming.status = local.status;
        }
        if self.is_pending(local.id, PendingField::Starred) {
            incoming.starred = local.starred;
        }
    }

    fn notify(&mut self, change: StoreChange) {
        self.revision += 1;
        let revision = self.revision;
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&change, revision);
        }
    }
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}
