//! Entry synchronization: filtering, pagination and optimistic mutations.
//!
//! These components never perform I/O themselves. They decide which requests
//! to make and fold the answers back into the [`EntryStore`](crate::store::EntryStore);
//! the UI layer dispatches the requests on background tasks.

pub mod filter;
mod mutation;
mod pagination;

pub use filter::{
    compute_visible, FilterState, FilterStatus, FilterType, OrderBy, OrderDirection, ServerSearch,
};
pub use mutation::{
    Applied, BulkRequest, MutationCoordinator, MutationRequest, MutationTicket, Settlement,
};
pub use pagination::{
    ListKind, ListState, LoadMorePlan, Pagination, RefreshPlan, RefreshResponse, Stale,
};
