use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use unicode_width::UnicodeWidthChar;

use crate::app::{App, InputMode};

pub fn render(app: &mut App, frame: &mut Frame) {
    let [chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    app.refresh_transcript();

    // Count rows after wrapping so the tail can be pinned exactly
    let rows = Paragraph::new(app.transcript.text())
        .wrap(Wrap { trim: false })
        .line_count(app.chat_width);
    app.total_lines = u16::try_from(rows).unwrap_or(u16::MAX);
    app.settle_scroll();

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let title = if app.is_following() {
        " Case Law Assistant ".to_string()
    } else {
        format!(" Case Law Assistant ({}/{}) ", app.scroll, app.total_lines.saturating_sub(app.chat_height))
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .title_bottom(Line::from(format!(" {} ", app.endpoint)).right_aligned());

    let chat = Paragraph::new(app.transcript.text())
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.is_thinking() {
        " Ask (waiting for answer...) "
    } else {
        " Ask (Enter to send) "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title);

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2);
    let (visible_text, cursor_x) = visible_input(&app.input, app.input_cursor, inner_width);

    // Cyan text to match the "You:" style
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// The slice of the composer that fits `width` columns with the cursor in view,
/// and the cursor's column within it. Wide characters take two columns.
fn visible_input(input: &str, cursor: usize, width: u16) -> (String, u16) {
    let width = usize::from(width);
    let chars: Vec<(char, usize)> = input
        .chars()
        .map(|c| (c, c.width().unwrap_or(0)))
        .collect();
    let cursor = cursor.min(chars.len());
    let columns = |range: &[(char, usize)]| range.iter().map(|(_, w)| w).sum::<usize>();

    // Drop characters from the left until the cursor cell is on screen
    let mut start = 0;
    while start < cursor && columns(&chars[start..cursor]) >= width {
        start += 1;
    }

    let mut used = 0;
    let mut visible = String::new();
    for (c, w) in &chars[start..] {
        if used + w > width {
            break;
        }
        used += w;
        visible.push(*c);
    }

    let cursor_x = columns(&chars[start..cursor]).min(width.saturating_sub(1));
    (visible, u16::try_from(cursor_x).unwrap_or(u16::MAX))
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let line = if let Some(notice) = &app.notice {
        Line::from(Span::styled(
            format!(" {}", notice.text),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ))
    } else {
        let hints = match app.input_mode {
            InputMode::Editing => " Esc: browse  Enter: send  PgUp/PgDn: scroll  Ctrl+C: quit",
            InputMode::Normal => {
                " i: type  j/k: scroll  g/G: top/bottom  [/]: select code  y: copy  q: quit"
            }
        };
        Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray)))
    };

    frame.render_widget(Paragraph::new(line), area);
}
