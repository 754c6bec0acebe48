use crate::app::{App, MAX_SCROLL};
use crate::util::{format_relative_time, strip_control_chars};
use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use std::sync::Arc;

/// Narrowest width the HTML renderer is asked to wrap at.
const MIN_WRAP_WIDTH: u16 = 20;

/// Render the detail pane for the open entry.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    // Layout may produce zero-sized rects during extreme terminal resizes
    if area.width < 3 || area.height < 3 {
        return;
    }

    // Area height minus 2 for borders
    app.detail_visible_lines = area.height.saturating_sub(2) as usize;

    let Some(entry) = app
        .navigator
        .active_entry()
        .and_then(|id| app.store.get(id))
    else {
        let paragraph = Paragraph::new("No entry open")
            .block(Block::default().borders(Borders::ALL).title(" Entry "));
        f.render_widget(paragraph, area);
        return;
    };

    let width = area.width.saturating_sub(2).max(MIN_WRAP_WIDTH);
    let original = match &app.original_content {
        Some((id, content)) if *id == entry.id => Some(Arc::clone(content)),
        _ => None,
    };
    let key = (entry.id, width, original.is_some());
    let cached = app.render_cache.get(&key).cloned();
    let body = match cached {
        Some(body) => body,
        None => {
            let html = original.as_deref().unwrap_or(&*entry.content);
            let body = html_to_text(html, width);
            app.render_cache.put(key, Arc::clone(&body));
            body
        }
    };

    let mut meta = vec![strip_control_chars(&entry.feed.title).into_owned()];
    if !entry.author.is_empty() {
        meta.push(strip_control_chars(&entry.author).into_owned());
    }
    meta.push(format_relative_time(entry.published_at, Utc::now()));

    let mut flags = Vec::new();
    if entry.starred {
        flags.push(Span::styled("★ starred  ", Style::default().fg(Color::Yellow)));
    }
    flags.push(Span::styled(
        entry.status.as_str(),
        Style::default().fg(if entry.status.is_unread() {
            Color::Cyan
        } else {
            Color::DarkGray
        }),
    ));

    let mut lines = vec![
        Line::from(Span::styled(
            strip_control_chars(&entry.title).into_owned(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            meta.join(" • "),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(flags),
    ];
    if let Some(url) = &entry.url {
        lines.push(Line::from(Span::styled(
            strip_control_chars(url).into_owned(),
            Style::default().fg(Color::Blue),
        )));
    }
    lines.push(Line::from(""));
    let header_len = lines.len();
    lines.extend(body.lines().map(|l| Line::from(l.to_string())));

    // Clamp before rendering so a resize never shows an empty viewport.
    let max_scroll = (header_len + body.lines().count())
        .saturating_sub(app.detail_visible_lines)
        .min(MAX_SCROLL);
    app.detail_scroll = app.detail_scroll.min(max_scroll);

    let title = if app.original_loading == Some(entry.id) {
        " Entry · fetching original... "
    } else if original.is_some() {
        " Entry · original "
    } else {
        " Entry "
    };
    let border_style = if app.navigator.is_detail_focused() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll as u16, 0));

    f.render_widget(paragraph, area);
}

/// Plain-text rendering of entry HTML, wrapped at `width` columns.
fn html_to_text(html: &str, width: u16) -> Arc<str> {
    let text = html2text::from_read(html.as_bytes(), width as usize);
    Arc::from(strip_control_chars(text.trim_end()).as_ref())
}
