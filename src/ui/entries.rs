use crate::app::App;
use crate::util::{display_width, format_relative_time, strip_control_chars, truncate_to_width};
use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Columns reserved for the markers and the age column.
const ROW_CHROME: usize = 12;

/// Render the entry list panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let now = Utc::now();
    let active = app.navigator.active_entry();
    let focused = !app.navigator.is_detail_focused() && !app.search_mode;
    let visible = app.visible();
    let title_width = (area.width as usize).saturating_sub(ROW_CHROME + 2);

    let mut items: Vec<ListItem> = visible
        .iter()
        .map(|entry| {
            let mut spans = Vec::with_capacity(4);

            spans.push(if entry.status.is_unread() {
                Span::styled("● ", Style::default().fg(Color::Cyan))
            } else {
                Span::raw("  ")
            });
            if entry.starred {
                spans.push(Span::styled("★ ", Style::default().fg(Color::Yellow)));
            }

            let title = strip_control_chars(&entry.title);
            let budget = title_width.saturating_sub(if entry.starred { 2 } else { 0 });
            let title = truncate_to_width(&title, budget).into_owned();
            let pad = budget.saturating_sub(display_width(&title));

            let title_style = if Some(entry.id) == active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else if entry.status.is_unread() {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(title, title_style));
            spans.push(Span::styled(
                format!("{}  {:>5}", " ".repeat(pad), format_relative_time(entry.published_at, now)),
                Style::default().fg(Color::DarkGray),
            ));

            ListItem::new(Line::from(spans))
        })
        .collect();

    let empty = items.is_empty();
    if empty {
        let msg = if app.pagination.is_refreshing() {
            "Loading..."
        } else {
            "No entries"
        };
        items.push(ListItem::new(msg));
    }

    let list_state = app.pagination.list(app.list_kind());
    if list_state.is_loading() {
        items.push(ListItem::new(Span::styled(
            "  Loading more...",
            Style::default().fg(Color::DarkGray),
        )));
    } else if list_state.load_more_visible() {
        items.push(ListItem::new(Span::styled(
            "  ↓ more entries (L)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let title = format!(
        " {} · {} ({}/{}) ",
        app.pagination.context().label(),
        app.filter.filter_status.label(),
        visible.len(),
        list_state.total()
    );

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    if !empty {
        state.select(Some(app.selected.min(visible.len().saturating_sub(1))));
    }
    f.render_stateful_widget(list, area, &mut state);
}
