//! Help overlay.
//!
//! One section per keybinding context with the keys of each action merged
//! onto one line. User overrides show up because the rows come from the live
//! registry. Sections that currently receive keys are marked.

use crate::app::App;
use crate::keybindings::{Action, Context};
use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const KEY_COLUMN: usize = 18;

pub fn render(f: &mut Frame, app: &App) {
    let overlay = overlay_area(f.area());
    if overlay.width < 24 || overlay.height < 6 {
        return;
    }

    let focused = if app.navigator.is_detail_focused() {
        Context::Detail
    } else {
        Context::EntryList
    };
    let lines = help_lines(&app.keybindings.all_bindings(), focused);

    let body_height = overlay.height.saturating_sub(2) as usize;
    let max_scroll = lines.len().saturating_sub(body_height);
    let scroll = app.help_scroll_offset.min(max_scroll);

    let title = if max_scroll > 0 {
        format!(" Keys {}/{} ", scroll + 1, max_scroll + 1)
    } else {
        " Keys ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title)
        .title_bottom(Line::from(" ? or Esc closes, j/k scrolls ").right_aligned());

    f.render_widget(Clear, overlay);
    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .scroll((scroll.min(u16::MAX as usize) as u16, 0)),
        overlay,
    );
}

fn overlay_area(area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Percentage(80)])
        .flex(Flex::Center)
        .areas(area);
    let [overlay] = Layout::horizontal([Constraint::Max(72)])
        .flex(Flex::Center)
        .areas(row);
    overlay
}

/// Overlay body. `focused` is the pane context that currently gets keys.
fn help_lines(
    bindings: &[(Context, String, Action, &'static str)],
    focused: Context,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for context in Context::ALL {
        // Keys per action, in registration order.
        let mut rows: Vec<(Action, &'static str, Vec<&str>)> = Vec::new();
        for (_, key, action, description) in bindings.iter().filter(|b| b.0 == context) {
            match rows.iter_mut().find(|row| row.0 == *action) {
                Some(row) => row.2.push(key.as_str()),
                None => rows.push((*action, *description, vec![key.as_str()])),
            }
        }
        if rows.is_empty() {
            continue;
        }

        let live = context == Context::Global || context == focused;
        let heading = if live {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD)
        };
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(vec![
            Span::styled(if live { "> " } else { "  " }, heading),
            Span::styled(context.title(), heading),
            Span::styled(
                format!("  {}", context.scope()),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

        for (_, description, keys) in rows {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("    {:<width$}", keys.join(", "), width = KEY_COLUMN),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(description),
            ]));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keybindings::KeybindingRegistry;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn rendered(focused: Context) -> Vec<String> {
        let registry = KeybindingRegistry::new();
        help_lines(&registry.all_bindings(), focused)
            .iter()
            .map(text)
            .collect()
    }

    #[test]
    fn test_keys_of_one_action_share_a_line() {
        let lines = rendered(Context::EntryList);
        let down = lines
            .iter()
            .find(|l| l.ends_with("Navigate down"))
            .unwrap();
        assert!(down.contains("j, Down"));
        assert_eq!(lines.iter().filter(|l| l.ends_with("Navigate down")).count(), 1);
    }

    #[test]
    fn test_detail_section_marked_only_when_focused() {
        let detail_heading = |lines: &[String]| {
            lines
                .iter()
                .find(|l| l.contains(Context::Detail.title()))
                .cloned()
                .unwrap()
        };

        let list_focused = rendered(Context::EntryList);
        let heading = detail_heading(&list_focused);
        assert!(heading.starts_with("  "));
        assert!(heading.contains("only while the detail pane has focus"));

        let detail_focused = rendered(Context::Detail);
        assert!(detail_heading(&detail_focused).starts_with("> "));
        assert!(detail_focused[0].starts_with("> General"));
    }

    #[test]
    fn test_overlay_is_centered_and_capped() {
        let area = Rect::new(0, 0, 120, 50);
        let overlay = overlay_area(area);
        assert_eq!(overlay.width, 72);
        assert_eq!(overlay.height, 40);
        assert_eq!(overlay.x, 24);
        assert_eq!(overlay.y, 5);
    }
}
