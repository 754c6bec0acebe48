//! Helper functions for UI operations.
//!
//! Everything that turns a user intent into background work lives here:
//! refreshes, page loads, remote mutations and the execution of navigation
//! effects. Spawned tasks only perform I/O and report back through the
//! `AppEvent` channel.

use crate::api::{ApiError, EntryContext, EntrySource};
use crate::app::{App, AppEvent};
use crate::nav::{DelayHandle, NavEffect};
use crate::store::{EntryId, EntryStatus};
use crate::sync::{
    compute_visible, Applied, FilterState, MutationRequest, RefreshPlan, RefreshResponse,
};
use crate::util::validate_url_for_open;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Wraps a future to catch panics and convert them to errors.
///
/// Instead of the task silently disappearing (caught by Tokio's runtime but not
/// handled), panics are converted to `Err(String)` containing the panic message.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Await a source call, turning a panic into a transport error.
///
/// Tasks whose result settles bookkeeping (in-flight mutations, page loads)
/// use this so a panic still produces their regular event.
pub(super) async fn call_source<F, T>(task: &'static str, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    catch_task_panic(call).await.unwrap_or_else(|panic_msg| {
        tracing::error!(task, error = %panic_msg, "Source call panicked");
        Err(ApiError::transport(format!("Internal error: {}", panic_msg)))
    })
}

/// Send an event to the loop, logging if the receiver is gone.
pub(super) async fn send_event(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
    let name = event.name();
    if let Err(e) = tx.send(event).await {
        tracing::warn!(error = %e, event = name, "Channel send failed (receiver dropped)");
    }
}

/// Spawn a background task whose outcome is a single event.
///
/// A panic inside `work` is reported as [`AppEvent::TaskPanicked`].
pub(super) fn spawn_task<F>(
    task: &'static str,
    tx: &mpsc::Sender<AppEvent>,
    work: F,
) -> JoinHandle<()>
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        match catch_task_panic(work).await {
            Ok(event) => send_event(&tx, event).await,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                let _ = tx
                    .send(AppEvent::TaskPanicked {
                        task,
                        error: panic_msg,
                    })
                    .await;
            }
        }
    })
}

// ============================================================================
// Refresh & Pagination
// ============================================================================

/// Refetch both lists from offset zero.
///
/// Any running refresh or page load is aborted; their results would be stale
/// anyway.
pub fn start_refresh(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if let Some(handle) = app.refresh_handle.take() {
        handle.abort();
    }
    app.abort_page_loads();

    let plan = app.pagination.begin_refresh(&app.filter);
    app.scroll_to_top();

    let source = Arc::clone(&app.source);
    let generation = plan.generation;
    app.refresh_handle = Some(spawn_task("refresh", tx, async move {
        let result = fetch_refresh(source.as_ref(), plan).await;
        AppEvent::RefreshLoaded { generation, result }
    }));
}

async fn fetch_refresh(
    source: &dyn EntrySource,
    plan: RefreshPlan,
) -> Result<RefreshResponse, ApiError> {
    match plan.unread {
        Some(unread) => {
            let (all, unread) = tokio::join!(
                source.fetch_entries(&plan.all),
                source.fetch_entries(&unread)
            );
            Ok(RefreshResponse {
                all: all?,
                unread: Some(unread?),
            })
        }
        None => Ok(RefreshResponse {
            all: source.fetch_entries(&plan.all).await?,
            unread: None,
        }),
    }
}

/// Request the next page of the visible list. Returns false when nothing
/// was started.
pub(super) fn start_load_more(app: &mut App, tx: &mpsc::Sender<AppEvent>) -> bool {
    let kind = app.list_kind();
    let Some(plan) = app.pagination.begin_load_more(kind, &app.filter) else {
        return false;
    };

    tracing::debug!(kind = ?plan.kind, offset = plan.params.offset, "Loading next page");
    let source = Arc::clone(&app.source);
    let handle = spawn_task("load_more", tx, async move {
        let result = call_source("load_more", source.fetch_entries(&plan.params)).await;
        AppEvent::PageLoaded { plan, result }
    });
    app.load_more_handles.retain(|h| !h.is_finished());
    app.load_more_handles.push(handle);
    true
}

/// Switch the whole view to another context and refetch.
pub(super) fn switch_context(
    app: &mut App,
    context: EntryContext,
    tx: &mpsc::Sender<AppEvent>,
) {
    if app.pagination.context() == context {
        start_refresh(app, tx);
        return;
    }

    tracing::info!(from = ?app.pagination.context(), to = ?context, "Switching context");
    let effects = app.navigator.reset();
    apply_effects(app, effects, tx);
    app.reset_detail();

    app.mutations.reset();
    app.pagination.set_context(context);
    app.store.clear();
    app.filter.reset_for_context();
    app.render_cache.clear();
    clear_search(app);

    start_refresh(app, tx);
    app.set_status(format!("Showing {}", context.label()));
}

// ============================================================================
// Filters & Ordering
// ============================================================================

/// Flip between the ALL and UNREAD lists.
///
/// Clearing the text filter refetches when the loaded pages came from a
/// server-side search.
pub(super) fn toggle_filter_status(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let context = app.pagination.context();
    if !context.has_unread_projection() {
        app.set_status(format!("{} has no unread filter", context.label()));
        return;
    }
    app.filter.filter_status = app.filter.filter_status.toggled();
    app.filter.reset_text();
    app.scroll_to_top();
    tracing::debug!(status = app.filter.filter_status.label(), "Filter status changed");
    refetch_if_search_changed(app, tx);
}

/// Start a refresh when the filter asks the server for other results than
/// the loaded pages hold.
pub(super) fn refetch_if_search_changed(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if app.pagination.search_changed(&app.filter) {
        start_refresh(app, tx);
    }
}

/// Change the sort key (`by_key`) or direction, refetching when the server
/// owns the order.
pub(super) fn change_order(app: &mut App, by_key: bool, tx: &mpsc::Sender<AppEvent>) {
    if by_key {
        app.filter.order_by = app.filter.order_by.next();
    } else {
        app.filter.order_direction = app.filter.order_direction.toggled();
    }

    if FilterState::order_change_requires_refetch(&app.pagination.context()) {
        start_refresh(app, tx);
    } else {
        app.clamp_selection();
    }
    app.set_status(format!(
        "Sorted by {} ({})",
        app.filter.order_by.as_str(),
        app.filter.order_direction.as_str()
    ));
}

/// Leave the search prompt without touching the filter.
pub(super) fn clear_search(app: &mut App) {
    app.search_mode = false;
    app.search_input.clear();
    app.pending_search = None;
    app.search_debounce = None;
    app.search_origin = None;
    app.search_restore_focus = false;
}

/// Install the pending search text as the local filter.
pub(super) fn apply_pending_search(app: &mut App) {
    app.search_debounce = None;
    if let Some(query) = app.pending_search.take() {
        tracing::debug!(query = %query, "Applying search filter");
        app.filter.filter_string = query;
        app.clamp_selection();
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// Fold a local optimistic change into the counters and send its request.
fn apply_local(app: &mut App, applied: Option<Applied>, tx: &mpsc::Sender<AppEvent>) {
    let Some(applied) = applied else {
        return;
    };
    app.pagination.adjust_unread_count(applied.unread_delta);
    if let Some(request) = applied.request {
        dispatch_mutation(app, request, tx);
    }
}

pub(super) fn dispatch_mutation(
    app: &App,
    request: MutationRequest,
    tx: &mpsc::Sender<AppEvent>,
) {
    tracing::debug!(entry_id = request.entry_id(), ?request, "Dispatching mutation");
    let source = Arc::clone(&app.source);
    spawn_task("mutation", tx, async move {
        let call = async {
            match &request {
                MutationRequest::Status { id, status, .. } => {
                    source.update_entry_status(&[*id], *status).await
                }
                MutationRequest::ToggleStarred { id, .. } => source.update_entry_starred(*id).await,
            }
        };
        let result = call_source("mutation", call).await;
        AppEvent::MutationSettled { request, result }
    });
}

pub(super) fn toggle_read(app: &mut App, id: EntryId, tx: &mpsc::Sender<AppEvent>) {
    let applied = app.mutations.toggle_status(&mut app.store, id);
    apply_local(app, applied, tx);
}

pub(super) fn toggle_star(app: &mut App, id: EntryId, tx: &mpsc::Sender<AppEvent>) {
    let applied = app.mutations.toggle_starred(&mut app.store, id);
    apply_local(app, applied, tx);
}

pub(super) fn mark_read(app: &mut App, id: EntryId, tx: &mpsc::Sender<AppEvent>) {
    let applied = app.mutations.set_status(&mut app.store, id, EntryStatus::Read);
    apply_local(app, applied, tx);
}

pub(super) fn mark_all_read(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let context = app.pagination.context();
    match app
        .mutations
        .mark_all_read(&mut app.store, &mut app.pagination, context)
    {
        Ok(bulk) => {
            app.set_status("Marking all as read...");
            let source = Arc::clone(&app.source);
            spawn_task("mark_all_read", tx, async move {
                let result = source.mark_all_read(&bulk.context).await;
                AppEvent::BulkSettled {
                    context: bulk.context,
                    result,
                }
            });
        }
        Err(e) => app.set_status(e.user_message()),
    }
}

// ============================================================================
// Navigation Effects
// ============================================================================

/// Execute the effects returned by a navigator transition, in order.
pub(super) fn apply_effects(app: &mut App, effects: Vec<NavEffect>, tx: &mpsc::Sender<AppEvent>) {
    for effect in effects {
        match effect {
            NavEffect::ScheduleMarkRead {
                entry_id,
                token,
                delay,
            } => {
                tracing::trace!(entry_id, ?delay, "Scheduling mark-read");
                let tx = tx.clone();
                app.mark_read_timer = Some(DelayHandle::schedule(delay, move || async move {
                    send_event(&tx, AppEvent::MarkReadElapsed { token }).await;
                }));
            }
            NavEffect::CancelMarkRead { .. } => app.cancel_mark_read(),
            NavEffect::LoadMoreThenAdvance => {
                app.advance_after_load = start_load_more(app, tx);
            }
            NavEffect::ToggleRead(id) => toggle_read(app, id, tx),
            NavEffect::ToggleStar(id) => toggle_star(app, id, tx),
            NavEffect::OpenExternal(id) => {
                let url = app.store.get(id).and_then(|e| e.url.clone());
                open_link(app, url.as_deref(), "Entry has no URL");
            }
            NavEffect::OpenMedia(id) => {
                let image = app
                    .store
                    .get(id)
                    .and_then(|e| e.first_image())
                    .map(str::to_owned);
                open_link(app, image.as_deref(), "Entry has no image");
            }
            NavEffect::FetchOriginal(id) => fetch_original(app, id, tx),
            NavEffect::ScrollDetailTop => app.reset_detail(),
        }
    }
}

/// Open the entry under the list selection in the detail pane.
pub(super) fn open_selected(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let Some((id, status)) = app.selected_entry().map(|e| (e.id, e.status)) else {
        return;
    };
    let effects = app.navigator.open(id, status);
    apply_effects(app, effects, tx);
}

/// Move the detail pane to the following or preceding visible entry.
pub(super) fn navigate(app: &mut App, forward: bool, jump: bool, tx: &mpsc::Sender<AppEvent>) {
    let can_load_more = app.can_load_more();
    let kind = app.list_kind();
    let effects = {
        let visible = compute_visible(app.pagination.entries(kind, &app.store), &app.filter);
        if forward {
            app.navigator.next(&visible, jump, can_load_more)
        } else {
            app.navigator.previous(&visible)
        }
    };
    apply_effects(app, effects, tx);
    if let Some(id) = app.navigator.active_entry() {
        app.select_entry(id);
    }
}

/// Close the detail pane if its entry is no longer loaded.
pub(super) fn reconcile_active_entry(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if let Some(id) = app.navigator.active_entry() {
        if !app.store.contains(id) {
            tracing::debug!(entry_id = id, "Active entry vanished, closing detail");
            let effects = app.navigator.reset();
            apply_effects(app, effects, tx);
            app.reset_detail();
        }
    }
}

/// Toggle between feed content and the original article for `id`.
fn fetch_original(app: &mut App, id: EntryId, tx: &mpsc::Sender<AppEvent>) {
    if app.original_for(id).is_some() {
        app.original_content = None;
        app.detail_scroll = 0;
        app.set_status("Showing feed content");
        return;
    }
    if app.original_loading == Some(id) {
        return;
    }
    if let Some(handle) = app.original_handle.take() {
        handle.abort();
    }

    app.original_loading = Some(id);
    app.set_status("Fetching original article...");
    let source = Arc::clone(&app.source);
    app.original_handle = Some(spawn_task("fetch_original", tx, async move {
        let result = source.fetch_original_content(id).await;
        AppEvent::OriginalLoaded {
            entry_id: id,
            result,
        }
    }));
}

/// Hand a link from entry data to the system opener.
fn open_link(app: &mut App, url: Option<&str>, missing: &'static str) {
    let Some(url) = url else {
        app.set_status(missing);
        return;
    };
    // SEC: Validate URL before open::that() to prevent command injection
    match validate_url_for_open(url) {
        Err(e) => app.set_status(e.to_string()),
        Ok(url) => {
            if let Err(e) = open::that(url.as_str()) {
                tracing::warn!(error = %e, "Failed to open browser");
                app.set_status(format!("Failed to open browser: {}", e));
            }
        }
    }
}
