//! Crossterm key events → session input.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use runbox_core::InputEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Input(InputEvent),
    /// Ctrl+L
    ClearScreen,
    /// Ctrl+D
    Quit,
}

/// `None` for key releases.
pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    // ── Ctrl combos ──
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => {
                Some(KeyAction::Input(InputEvent::Interrupt))
            }
            KeyCode::Char('d') | KeyCode::Char('D') => Some(KeyAction::Quit),
            KeyCode::Char('l') | KeyCode::Char('L') => Some(KeyAction::ClearScreen),
            _ => Some(KeyAction::Input(InputEvent::Other)),
        };
    }

    // ── Bare keys ──
    let event = match key.code {
        KeyCode::Char(c) => InputEvent::Char(c),
        KeyCode::Backspace => InputEvent::Backspace,
        KeyCode::Enter => InputEvent::Enter,
        KeyCode::Up => InputEvent::HistoryPrev,
        KeyCode::Down => InputEvent::HistoryNext,
        _ => InputEvent::Other,
    };
    Some(KeyAction::Input(event))
}
