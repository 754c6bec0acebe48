//! Boundary to the remote feed service.
//!
//! The sync layer only sees the [`EntrySource`] trait; [`MinifluxClient`] is
//! the production implementation.

mod client;
mod error;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::MinifluxClient;
pub use error::ApiError;
pub use types::{EntryContext, FetchParams};

use crate::store::{EntryId, EntryPage, EntryStatus};
use async_trait::async_trait;

/// Remote source of truth for entries.
///
/// Every call resolves to its payload or a tagged [`ApiError`]. None of the
/// methods retry.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// One page of entries plus the server-side total for the same query.
    async fn fetch_entries(&self, params: &FetchParams) -> Result<EntryPage, ApiError>;

    async fn update_entry_status(
        &self,
        ids: &[EntryId],
        status: EntryStatus,
    ) -> Result<(), ApiError>;

    /// Flip the starred flag on the server. The server does the toggling, so
    /// the request carries no target value.
    async fn update_entry_starred(&self, id: EntryId) -> Result<(), ApiError>;

    async fn mark_all_read(&self, context: &EntryContext) -> Result<(), ApiError>;

    /// Content scraped from the entry's original web page.
    async fn fetch_original_content(&self, id: EntryId) -> Result<String, ApiError>;
}
