use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tracing::debug;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Resolved(resolution) => {
            let id = resolution.id;
            if !app.conversation.resolve(resolution) {
                debug!(request = %id, "dropped stale resolution");
            }
        }
        AppEvent::Copied(outcome) => app.set_notice(outcome.notice()),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the composer
        KeyCode::Char('i') | KeyCode::Tab | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input.chars().count();
        }

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(app.page_size()),
        KeyCode::PageUp => app.scroll_up(app.page_size()),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.page_size() / 2)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.page_size() / 2)
        }
        KeyCode::Char('g') | KeyCode::Home => app.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),

        // Code blocks
        KeyCode::Char(']') => app.select_next_block(),
        KeyCode::Char('[') => app.select_prev_block(),
        KeyCode::Char('y') => app.copy_selected_block(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        // Transcript stays scrollable while typing
        KeyCode::PageDown => app.scroll_down(app.page_size()),
        KeyCode::PageUp => app.scroll_up(app.page_size()),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebot_core::{Config, CopyOutcome, Resolution};
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: crossterm::event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c)));
        }
    }

    fn app() -> App {
        App::new(&Config::new())
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        assert_eq!(char_to_byte_index("판례abc", 0), 0);
        assert_eq!(char_to_byte_index("판례abc", 1), 3);
        assert_eq!(char_to_byte_index("판례abc", 2), 6);
        assert_eq!(char_to_byte_index("판례abc", 10), 9);
    }

    #[test]
    fn test_editing_with_cursor_moves() {
        let mut app = app();
        type_str(&mut app, "판례");
        handle_event(&mut app, key(KeyCode::Home));
        type_str(&mut app, "x");
        handle_event(&mut app, key(KeyCode::End));
        handle_event(&mut app, key(KeyCode::Backspace));
        handle_event(&mut app, key(KeyCode::Left));
        handle_event(&mut app, key(KeyCode::Delete));
        assert_eq!(app.input, "x");
        assert_eq!(app.input_cursor, 1);
    }

    #[test]
    fn test_enter_submits_once_while_pending() {
        let mut app = app();
        type_str(&mut app, "first");
        handle_event(&mut app, key(KeyCode::Enter));
        type_str(&mut app, "second");
        handle_event(&mut app, key(KeyCode::Enter));

        assert_eq!(app.take_outgoing_queries().len(), 1);
        assert_eq!(app.input, "second");
        assert_eq!(app.messages().iter().filter(|m| m.is_thinking()).count(), 1);
    }

    #[test]
    fn test_resolved_event_settles_placeholder() {
        let mut app = app();
        type_str(&mut app, "question");
        handle_event(&mut app, key(KeyCode::Enter));
        let pending = app.take_outgoing_queries().pop().unwrap();

        handle_event(
            &mut app,
            AppEvent::Resolved(Resolution {
                id: pending.id,
                outcome: Ok("answer".into()),
            }),
        );
        assert!(!app.is_thinking());
        assert_eq!(app.messages().last().unwrap().content_str(), "answer");
    }

    #[test]
    fn test_normal_mode_keys() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);

        // Typing in normal mode does not edit the composer
        handle_event(&mut app, key(KeyCode::Char('x')));
        assert!(app.input.is_empty());

        handle_event(&mut app, key(KeyCode::Char('i')));
        assert_eq!(app.input_mode, InputMode::Editing);

        handle_event(&mut app, key(KeyCode::Tab));
        handle_event(&mut app, key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_ctrl_c_quits_while_editing() {
        let mut app = app();
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_copy_outcome_becomes_notice() {
        let mut app = app();
        handle_event(&mut app, AppEvent::Copied(CopyOutcome::Copied { chars: 14 }));
        assert_eq!(app.notice.unwrap().text, "Copied 14 characters");
    }
}
