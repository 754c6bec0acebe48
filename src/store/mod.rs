//! Entry cache: domain types and the observable in-memory store.

mod entry_store;
mod types;

pub use entry_store::{EntryStore, PendingField, StoreChange, SubscriptionId};
pub use types::{parse_first_image, Entry, EntryId, EntryPage, EntryPatch, EntryStatus, FeedRef};

#[cfg(test)]
pub(crate) use types::test_entry;
