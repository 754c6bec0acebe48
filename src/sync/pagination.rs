//! Pagination and merge controller for the "all" and "unread" lists.
//!
//! Both lists only hold ids; payloads live in the shared [`EntryStore`].
//! Every refresh starts a new generation. Pages fetched for an older
//! generation are rejected on arrival, so a load-more that raced a refresh
//! can never append to the new list.

use super::filter::{FilterState, FilterStatus, ServerSearch};
use crate::api::{EntryContext, FetchParams};
use crate::store::{Entry, EntryId, EntryPage, EntryStatus, EntryStore};
use std::collections::HashSet;
use thiserror::Error;

/// Which of the two logical lists an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    All,
    Unread,
}

impl From<FilterStatus> for ListKind {
    fn from(status: FilterStatus) -> Self {
        match status {
            FilterStatus::All => Self::All,
            FilterStatus::Unread => Self::Unread,
        }
    }
}

/// A page arrived for a generation that has since been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("discarded stale page (generation {received}, current {current})")]
pub struct Stale {
    pub received: u64,
    pub current: u64,
}

// ============================================================================
// List State
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ListState {
    ids: Vec<EntryId>,
    /// Offset of the last page fetched into this list.
    offset: usize,
    total: u64,
    load_more_visible: bool,
    loading: bool,
}

impl ListState {
    pub fn ids(&self) -> &[EntryId] {
        &self.ids
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn load_more_visible(&self) -> bool {
        self.load_more_visible
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn reset_with(&mut self, page: &EntryPage) {
        self.ids.clear();
        self.offset = 0;
        self.total = page.total;
        self.loading = false;
        self.append(page);
    }

    /// Append unseen ids in page order. Returns how many were new.
    fn append(&mut self, page: &EntryPage) -> usize {
        let mut known: HashSet<EntryId> = self.ids.iter().copied().collect();
        let before = self.ids.len();
        for entry in &page.entries {
            if known.insert(entry.id) {
                self.ids.push(entry.id);
            }
        }
        // An empty page means the server has nothing past this window even if
        // the reported total disagrees (entries changed status meanwhile).
        self.load_more_visible = !page.entries.is_empty() && (self.ids.len() as u64) < self.total;
        self.ids.len() - before
    }
}

// ============================================================================
// Plans
// ============================================================================

/// Requests to issue for a full refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPlan {
    pub generation: u64,
    pub all: FetchParams,
    /// `None` when one fetch serves both lists.
    pub unread: Option<FetchParams>,
}

/// Server answers for a [`RefreshPlan`].
#[derive(Debug, Default)]
pub struct RefreshResponse {
    pub all: EntryPage,
    pub unread: Option<EntryPage>,
}

/// Offsets and search to fall back to if a refresh never lands.
#[derive(Debug, Clone)]
struct PendingRefresh {
    offsets: (usize, usize),
    search: Option<ServerSearch>,
}

/// One next-page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMorePlan {
    pub generation: u64,
    pub kind: ListKind,
    pub params: FetchParams,
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug)]
pub struct Pagination {
    page_size: usize,
    context: EntryContext,
    generation: u64,
    refreshing: bool,
    all: ListState,
    unread: ListState,
    /// Server-reported unread total, adjusted by local optimistic changes.
    unread_count: u64,
    /// Search the "all" list was fetched with. Later pages reuse it.
    search: Option<ServerSearch>,
    pending: Option<PendingRefresh>,
}

impl Pagination {
    pub fn new(context: EntryContext, page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            context,
            generation: 0,
            refreshing: false,
            all: ListState::default(),
            unread: ListState::default(),
            unread_count: 0,
            search: None,
            pending: None,
        }
    }

    pub fn context(&self) -> EntryContext {
        self.context
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    /// Server-side search text behind the loaded "all" list.
    pub fn server_search(&self) -> Option<&str> {
        self.search.as_ref().map(|s| s.text.as_str())
    }

    /// Whether `filter` asks the server for different results than the
    /// latest refresh did.
    pub fn search_changed(&self, filter: &FilterState) -> bool {
        let requested = match &self.pending {
            Some(pending) => &pending.search,
            None => &self.search,
        };
        filter.server_search() != *requested
    }

    pub fn list(&self, kind: ListKind) -> &ListState {
        match self.effective(kind) {
            ListKind::All => &self.all,
            ListKind::Unread => &self.unread,
        }
    }

    /// Entries of `kind` in list order, skipping ids the store no longer has.
    pub fn entries<'a>(
        &'a self,
        kind: ListKind,
        store: &'a EntryStore,
    ) -> impl Iterator<Item = &'a Entry> + 'a {
        store.get_many(self.list(kind).ids())
    }

    /// Switch to a new context. Lists are emptied; the caller clears the
    /// store and then starts a refresh.
    pub fn set_context(&mut self, context: EntryContext) {
        self.context = context;
        self.generation += 1;
        self.refreshing = false;
        self.all = ListState::default();
        self.unread = ListState::default();
        self.unread_count = 0;
        self.search = None;
        self.pending = None;
    }

    /// Start a full refresh of both lists.
    ///
    /// Offsets go back to zero and any in-flight load-more is abandoned. The
    /// caller is responsible for scrolling the list back to the top.
    ///
    /// Only the "all" request carries the search; the unread request is
    /// filtered by status alone so the unread count covers the whole context.
    pub fn begin_refresh(&mut self, filter: &FilterState) -> RefreshPlan {
        self.generation += 1;
        self.refreshing = true;

        let search = filter.server_search();
        let offsets = match &self.pending {
            Some(pending) => pending.offsets,
            None => (self.all.offset, self.unread.offset),
        };
        self.pending = Some(PendingRefresh {
            offsets,
            search: search.clone(),
        });
        for list in [&mut self.all, &mut self.unread] {
            list.offset = 0;
            list.loading = false;
        }

        let all = self.params(filter, 0, None, search.as_ref());
        let unread = self
            .context
            .has_unread_projection()
            .then(|| self.params(filter, 0, Some(EntryStatus::Unread), None));

        tracing::debug!(
            generation = self.generation,
            context = ?self.context,
            "Starting refresh"
        );
        RefreshPlan {
            generation: self.generation,
            all,
            unread,
        }
    }

    /// Install a completed refresh. Replaces the store contents.
    pub fn apply_refresh(
        &mut self,
        generation: u64,
        response: RefreshResponse,
        store: &mut EntryStore,
    ) -> Result<(), Stale> {
        self.check_generation(generation)?;
        self.refreshing = false;
        if let Some(pending) = self.pending.take() {
            self.search = pending.search;
        }

        self.all.reset_with(&response.all);
        match &response.unread {
            Some(unread) => {
                self.unread.reset_with(unread);
                self.unread_count = unread.total;
            }
            None => {
                self.unread = self.all.clone();
                self.unread_count = response.all.total;
            }
        }

        let mut entries = response.all.entries;
        if let Some(unread) = response.unread {
            entries.extend(unread.entries);
        }
        store.replace_all(entries);

        tracing::debug!(
            generation,
            all = self.all.ids.len(),
            unread = self.unread.ids.len(),
            unread_count = self.unread_count,
            "Refresh applied"
        );
        Ok(())
    }

    /// Mark a refresh as finished without data. Returns false if stale.
    ///
    /// The lists still hold the previous pages, so their offsets are put back.
    pub fn fail_refresh(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.refreshing = false;
        if let Some(pending) = self.pending.take() {
            (self.all.offset, self.unread.offset) = pending.offsets;
        }
        true
    }

    /// Plan the next page for `kind`.
    ///
    /// Returns `None` when the list is exhausted, a refresh is running, or a
    /// page for this list is already in flight.
    pub fn begin_load_more(&mut self, kind: ListKind, filter: &FilterState) -> Option<LoadMorePlan> {
        if self.refreshing {
            return None;
        }
        let kind = self.effective(kind);
        let list = self.list(kind);
        if !list.load_more_visible || list.loading {
            return None;
        }

        let offset = list.offset + self.page_size;
        let params = match kind {
            ListKind::Unread => self.params(filter, offset, Some(EntryStatus::Unread), None),
            ListKind::All => self.params(filter, offset, None, self.search.as_ref()),
        };
        self.list_mut(kind).loading = true;

        Some(LoadMorePlan {
            generation: self.generation,
            kind,
            params,
        })
    }

    /// Append a fetched page. Returns the number of new ids.
    pub fn apply_load_more(
        &mut self,
        plan: &LoadMorePlan,
        page: EntryPage,
        store: &mut EntryStore,
    ) -> Result<usize, Stale> {
        self.check_generation(plan.generation)?;

        let list = self.list_mut(plan.kind);
        list.loading = false;
        list.offset = plan.params.offset;
        list.total = page.total;
        let appended = list.append(&page);

        if !self.context.has_unread_projection() {
            self.unread = self.all.clone();
        }
        store.upsert_many(page.entries);

        tracing::debug!(
            kind = ?plan.kind,
            offset = plan.params.offset,
            appended,
            "Page appended"
        );
        Ok(appended)
    }

    /// Release the in-flight flag after a failed page. Returns false if stale.
    pub fn fail_load_more(&mut self, plan: &LoadMorePlan) -> bool {
        if plan.generation != self.generation {
            return false;
        }
        self.list_mut(plan.kind).loading = false;
        true
    }

    pub fn adjust_unread_count(&mut self, delta: i64) {
        self.unread_count = self.unread_count.saturating_add_signed(delta);
    }

    pub fn zero_unread_count(&mut self) {
        self.unread_count = 0;
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// History keeps a single list serving both views.
    fn effective(&self, kind: ListKind) -> ListKind {
        if self.context.has_unread_projection() {
            kind
        } else {
            ListKind::All
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut ListState {
        match kind {
            ListKind::All => &mut self.all,
            ListKind::Unread => &mut self.unread,
        }
    }

    fn check_generation(&self, generation: u64) -> Result<(), Stale> {
        if generation == self.generation {
            Ok(())
        } else {
            tracing::debug!(
                received = generation,
                current = self.generation,
                "Discarding stale page"
            );
            Err(Stale {
                received: generation,
                current: self.generation,
            })
        }
    }

    fn params(
        &self,
        filter: &FilterState,
        offset: usize,
        status: Option<EntryStatus>,
        search: Option<&ServerSearch>,
    ) -> FetchParams {
        FetchParams {
            context: self.context,
            offset,
            limit: self.page_size,
            status,
            order_by: filter.order_by,
            direction: filter.order_direction,
            filter_type: search.map(|s| s.filter_type),
            filter_string: search.map(|s| s.text.clone()),
        }
    }
}
