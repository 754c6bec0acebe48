use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the one-line footer: search prompt, status message or list summary.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    // Guard against zero-width/height areas
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if app.search_mode {
        Cow::Owned(format!(
            "Search [{}]: {}_   (Tab field · Enter apply · Esc cancel)",
            app.filter.filter_type.label(),
            app.search_input
        ))
    } else if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if app.pagination.is_refreshing() {
        Cow::Borrowed("Refreshing...")
    } else {
        let mut summary = format!(
            "{} unread · {} · {} {}",
            app.pagination.unread_count(),
            app.filter.filter_status.label(),
            app.filter.order_by.as_str(),
            app.filter.order_direction.as_str(),
        );
        if !app.filter.filter_string.is_empty() {
            summary.push_str(&format!(
                " · {}~\"{}\"",
                app.filter.filter_type.label(),
                app.filter.filter_string
            ));
        }
        summary.push_str("   [?]help [q]uit");
        Cow::Owned(summary)
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}
