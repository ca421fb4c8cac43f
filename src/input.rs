//! Key bindings: arrows, wasd and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Pause,
    Confirm,
    Restart,
    Menu,
    Quit,
    None,
}

/// Map key event to game action. Movement keys double as menu navigation.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => Action::Quit,
        KeyCode::Char('q') if no_mod => Action::Quit,
        KeyCode::Char('p') | KeyCode::Esc if no_mod => Action::Pause,
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('h') if no_mod => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('l') if no_mod => Action::MoveRight,
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Confirm,
        KeyCode::Char('r') if no_mod => Action::Restart,
        KeyCode::Char('m') if no_mod => Action::Menu,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    #[test]
    fn movement_keys_map_both_layouts() {
        assert_eq!(key_to_action(key(KeyCode::Left)), Action::MoveLeft);
        assert_eq!(key_to_action(key(KeyCode::Char('a'))), Action::MoveLeft);
        assert_eq!(key_to_action(key(KeyCode::Char('l'))), Action::MoveRight);
    }

    #[test]
    fn modified_keys_are_ignored() {
        let mut k = key(KeyCode::Left);
        k.modifiers = KeyModifiers::ALT;
        assert_eq!(key_to_action(k), Action::None);
    }

    #[test]
    fn ctrl_c_quits() {
        let mut k = key(KeyCode::Char('c'));
        k.modifiers = KeyModifiers::CONTROL;
        assert_eq!(key_to_action(k), Action::Quit);
    }
}
