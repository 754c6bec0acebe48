//! Application event handling.
//!
//! This module folds background task results back into application state:
//! refreshed lists, appended pages, settled mutations and timer firings.

use crate::app::{App, AppEvent};
use crate::sync::MutationRequest;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::helpers::{
    dispatch_mutation, mark_read, navigate, reconcile_active_entry, start_refresh,
};

/// Handle application events from background tasks.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent, event_tx: &mpsc::Sender<AppEvent>) {
    tracing::trace!(event = event.name(), "Handling app event");
    match event {
        AppEvent::RefreshLoaded { generation, result } => match result {
            Ok(response) => {
                match app
                    .pagination
                    .apply_refresh(generation, response, &mut app.store)
                {
                    Ok(()) => {
                        app.refresh_handle = None;
                        reconcile_active_entry(app, event_tx);
                        app.clamp_selection();
                    }
                    Err(stale) => tracing::debug!(%stale, "Discarding refresh"),
                }
            }
            Err(e) => {
                if app.pagination.fail_refresh(generation) {
                    app.refresh_handle = None;
                    app.report_error("Refresh failed", &e);
                } else {
                    tracing::debug!(generation, error = %e, "Ignoring failure of superseded refresh");
                }
            }
        },
        AppEvent::PageLoaded { plan, result } => {
            match result {
                Ok(page) => match app.pagination.apply_load_more(&plan, page, &mut app.store) {
                    Ok(appended) => {
                        if appended == 0 {
                            app.set_status("No more entries");
                        }
                        if std::mem::take(&mut app.advance_after_load) {
                            navigate(app, true, false, event_tx);
                        }
                    }
                    Err(stale) => tracing::debug!(%stale, "Discarding page"),
                },
                Err(e) => {
                    if app.pagination.fail_load_more(&plan) {
                        app.advance_after_load = false;
                        app.report_error("Loading more failed", &e);
                    }
                }
            }
            app.load_more_handles.retain(|h| !h.is_finished());
        }
        AppEvent::MutationSettled { request, result } => {
            let settlement = app.mutations.settle(&mut app.store, &request, result);
            app.pagination.adjust_unread_count(settlement.unread_delta);
            if let Some(follow_up) = settlement.follow_up {
                dispatch_mutation(app, follow_up, event_tx);
            }
            if let Some(err) = settlement.error {
                let what = match request {
                    MutationRequest::Status { .. } => "Updating read status failed",
                    MutationRequest::ToggleStarred { .. } => "Updating star failed",
                };
                app.report_error(what, &err);
            }
        }
        AppEvent::BulkSettled { context, result } => {
            match result {
                Ok(()) => app.set_status("Marked all as read"),
                Err(e) => app.report_error("Mark all as read failed", &e),
            }
            // The server state is authoritative either way.
            if context == app.pagination.context() && !app.session_expired {
                start_refresh(app, event_tx);
            }
        }
        AppEvent::MarkReadElapsed { token } => {
            if let Some(entry_id) = app.navigator.mark_read_elapsed(token) {
                app.mark_read_timer = None;
                tracing::debug!(entry_id, "Open delay elapsed, marking read");
                mark_read(app, entry_id, event_tx);
            }
        }
        AppEvent::OriginalLoaded { entry_id, result } => {
            if app.original_loading != Some(entry_id) {
                tracing::debug!(entry_id, "Discarding original content for closed entry");
                return;
            }
            app.original_loading = None;
            app.original_handle = None;
            match result {
                Ok(content) => {
                    app.original_content = Some((entry_id, Arc::from(content)));
                    app.detail_scroll = 0;
                    app.set_status("Showing original article");
                }
                Err(e) => app.report_error("Fetching original failed", &e),
            }
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            if task == "refresh" {
                let generation = app.pagination.generation();
                app.pagination.fail_refresh(generation);
            }
            app.set_status(format!("Internal error in {} task", task));
        }
    }
}
