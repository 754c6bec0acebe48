//! Input handling for the TUI.
//!
//! Keys are resolved through the keybinding registry in the context of the
//! focused pane, then dispatched to the sync layer or the navigator.

use crate::api::EntryContext;
use crate::app::{App, AppEvent};
use crate::keybindings::{Action as KbAction, Context as KbContext};
use crate::util::MAX_SEARCH_QUERY_LENGTH;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{
    apply_effects, apply_pending_search, change_order, clear_search, mark_all_read, navigate,
    open_selected, refetch_if_search_changed, start_load_more, start_refresh, switch_context,
    toggle_filter_status, toggle_read, toggle_star,
};
use super::Action;
use crate::nav::NavEffect;

/// Lines moved by a page scroll in the detail pane when its height is unknown.
const PAGE_SCROLL_FALLBACK: usize = 20;

/// Context the key is resolved in. The detail bindings are only live while
/// the detail pane owns the key listener.
fn input_context(app: &App) -> KbContext {
    if app.navigator.is_detail_focused() {
        KbContext::Detail
    } else {
        KbContext::EntryList
    }
}

/// Main input dispatch function.
///
/// Routes input to the appropriate handler based on current mode.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    // Help overlay captures all keys when visible
    if app.show_help {
        return handle_help_input(app, code);
    }

    if app.search_mode {
        handle_search_input(app, code, modifiers, event_tx);
        return Action::Continue;
    }

    let action = app
        .keybindings
        .action_for_key(code, modifiers, input_context(app));
    match action {
        Some(action) => dispatch(app, action, event_tx),
        None => Action::Continue,
    }
}

/// Handle input while the help overlay is visible.
///
/// Captures all keys: j/k/Up/Down scroll, Esc/q/? dismiss.
fn handle_help_input(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
            app.show_help = false;
            app.help_scroll_offset = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_sub(1);
        }
        _ => {}
    }
    Action::Continue
}

fn dispatch(app: &mut App, action: KbAction, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    let detail = app.navigator.is_detail_focused();
    match action {
        KbAction::Quit => return Action::Quit,
        KbAction::ShowHelp => {
            app.show_help = true;
            app.help_scroll_offset = 0;
        }

        // List
        KbAction::NavDown => {
            if app.at_list_end() {
                // Reaching the bottom pulls the next page.
                if start_load_more(app, event_tx) {
                    app.set_status("Loading more...");
                }
            } else {
                app.nav_down();
            }
        }
        KbAction::NavUp => app.nav_up(),
        KbAction::OpenEntry => open_selected(app, event_tx),
        KbAction::LoadMore => {
            if start_load_more(app, event_tx) {
                app.set_status("Loading more...");
            } else {
                app.set_status("Nothing more to load");
            }
        }
        KbAction::ToggleFocus => {
            if detail {
                app.navigator.blur();
            } else {
                app.navigator.focus();
            }
        }

        // Detail
        KbAction::ExitDetail => {
            let effects = app.navigator.escape();
            apply_effects(app, effects, event_tx);
            app.reset_detail();
        }
        KbAction::NextEntry => navigate(app, true, false, event_tx),
        KbAction::PrevEntry => navigate(app, false, false, event_tx),
        KbAction::JumpNext => navigate(app, true, true, event_tx),
        KbAction::JumpPrev => navigate(app, false, true, event_tx),
        KbAction::ScrollDown => app.scroll_down(1),
        KbAction::ScrollUp => app.scroll_up(1),
        KbAction::PageDown => app.scroll_down(page_lines(app)),
        KbAction::PageUp => app.scroll_up(page_lines(app)),

        // Entry actions: the open entry in the detail pane, otherwise the
        // list selection.
        KbAction::ToggleRead => {
            if detail {
                let effects = app.navigator.toggle_read();
                apply_effects(app, effects, event_tx);
            } else if let Some(id) = app.selected_entry().map(|e| e.id) {
                toggle_read(app, id, event_tx);
            }
        }
        KbAction::ToggleStar => {
            if detail {
                let effects = app.navigator.toggle_star();
                apply_effects(app, effects, event_tx);
            } else if let Some(id) = app.selected_entry().map(|e| e.id) {
                toggle_star(app, id, event_tx);
            }
        }
        KbAction::OpenExternal => {
            let effects = if detail {
                app.navigator.open_external()
            } else {
                app.selected_entry()
                    .map(|e| vec![NavEffect::OpenExternal(e.id)])
                    .unwrap_or_default()
            };
            apply_effects(app, effects, event_tx);
        }
        KbAction::FetchOriginal => {
            let effects = app.navigator.open_original();
            apply_effects(app, effects, event_tx);
        }
        KbAction::OpenMedia => {
            let effects = app.navigator.open_media();
            apply_effects(app, effects, event_tx);
        }

        // Whole list
        KbAction::Refresh => {
            start_refresh(app, event_tx);
            app.set_status("Refreshing...");
        }
        KbAction::MarkAllRead => mark_all_read(app, event_tx),
        KbAction::ToggleFilterStatus => toggle_filter_status(app, event_tx),
        KbAction::ToggleOrderDirection => change_order(app, false, event_tx),
        KbAction::CycleOrderBy => change_order(app, true, event_tx),
        KbAction::ShowAll => switch_context(app, EntryContext::All, event_tx),
        KbAction::ShowStarred => switch_context(app, EntryContext::Starred, event_tx),
        KbAction::ShowHistory => switch_context(app, EntryContext::History, event_tx),

        // Search
        KbAction::EnterSearch => enter_search(app),
        KbAction::ExitSearch | KbAction::CommitSearch | KbAction::CycleFilterType => {}
    }
    Action::Continue
}

fn page_lines(app: &App) -> usize {
    match app.detail_visible_lines {
        0 => PAGE_SCROLL_FALLBACK,
        lines => lines.saturating_sub(1).max(1),
    }
}

// ============================================================================
// Search
// ============================================================================

fn enter_search(app: &mut App) {
    app.search_mode = true;
    app.search_input = app.filter.filter_string.clone();
    app.search_origin = Some((app.filter.filter_string.clone(), app.filter.filter_type));
    app.search_restore_focus = app.navigator.is_detail_focused();
    app.navigator.blur();
}

/// Leave the prompt, handing the key listener back to the detail pane if it
/// had it.
fn leave_search(app: &mut App) {
    if app.search_restore_focus {
        app.navigator.focus();
    }
    clear_search(app);
}

/// Handle input in search mode.
///
/// Only the search bindings are consulted; every other key edits the query,
/// so global keys like `q` can be typed.
fn handle_search_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let action = app
        .keybindings
        .action_for_key(code, modifiers, KbContext::Search)
        .filter(|a| {
            matches!(
                a,
                KbAction::ExitSearch | KbAction::CommitSearch | KbAction::CycleFilterType
            )
        });

    match action {
        Some(KbAction::ExitSearch) => {
            // Cancel: restore the filter that was active before the prompt.
            if let Some((text, kind)) = app.search_origin.take() {
                app.filter.filter_string = text;
                app.filter.filter_type = kind;
            }
            app.clamp_selection();
            leave_search(app);
        }
        Some(KbAction::CommitSearch) => {
            // Cancel any pending debounce - explicit commit takes priority
            app.pending_search = Some(app.search_input.clone());
            apply_pending_search(app);
            leave_search(app);
            refetch_if_search_changed(app, event_tx);
        }
        Some(_) => {
            app.filter.filter_type = app.filter.filter_type.next();
            app.clamp_selection();
            app.set_status(format!("Searching {}", app.filter.filter_type.label()));
        }
        None => match code {
            KeyCode::Backspace => {
                app.search_input.pop();
                app.search_debounce = Some(tokio::time::Instant::now());
                app.pending_search = Some(app.search_input.clone());
            }
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
                // Prevent input beyond max search length
                if app.search_input.len() >= MAX_SEARCH_QUERY_LENGTH {
                    app.set_status(format!(
                        "Search query at max length ({} chars)",
                        MAX_SEARCH_QUERY_LENGTH
                    ));
                    return;
                }
                app.search_input.push(c);
                app.search_debounce = Some(tokio::time::Instant::now());
                app.pending_search = Some(app.search_input.clone());
            }
            _ => {}
        },
    }
}
