//! Render functions for the TUI.
//!
//! The screen is the entry list, the detail pane when an entry is open, and a
//! one-line footer. The help overlay is drawn on top.

use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    widgets::Paragraph,
    Frame,
};

use super::{detail, entries, footer, help};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Main render dispatch function.
///
/// Handles terminal size validation before rendering.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    // Guard against zero-width/height to prevent panics
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    if app.navigator.active_entry().is_some() {
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[0]);
        entries::render(f, app, panes[0]);
        detail::render(f, app, panes[1]);
    } else {
        entries::render(f, app, rows[0]);
    }
    footer::render(f, app, rows[1]);

    // Render help overlay on top of any view when active
    if app.show_help {
        help::render(f, app);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeSource;
    use crate::app::tests::{test_app_with, RecordingSession};
    use crate::store::{test_entry, EntryStatus};
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};
    use std::sync::Arc;

    fn buffer_text(buffer: &Buffer) -> String {
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_too_small_terminal() {
        let mut app = test_app_with(
            Arc::new(FakeSource::default()),
            Arc::new(RecordingSession::default()),
        );
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        assert!(buffer_text(terminal.backend().buffer()).contains("Terminal too small"));
    }

    #[tokio::test]
    async fn test_detail_pane_shows_open_entry() {
        let mut app = test_app_with(
            Arc::new(FakeSource::default()),
            Arc::new(RecordingSession::default()),
        );
        let mut entry = test_entry(1, EntryStatus::Unread);
        entry.content = Arc::from("<p>Hello from the body</p>");
        app.store.upsert_many(vec![entry]);
        let _ = app.navigator.open(1, EntryStatus::Read);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();

        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Hello from the body"));
        assert!(app.detail_visible_lines > 0);
        assert_eq!(app.render_cache.len(), 1);
    }
}
