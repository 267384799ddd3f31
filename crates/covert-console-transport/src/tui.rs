//! Key bindings for terminal front ends.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key does while browsing the configuration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Up,
    Down,
    /// Edit the selected field.
    Edit,
    CycleChannel,
    AddProcessor,
    CycleProcessor,
    RemoveProcessor,
    MoveProcessorUp,
    MoveProcessorDown,
    OpenChannel,
    CloseChannel,
    /// Start typing a covert message.
    Compose,
    Save,
    Load,
    Quit,
}

/// What a key does while a text buffer has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Char(char),
    Backspace,
    /// Enter: ends single-line input, breaks the line in multi-line input.
    Return,
    /// Tab or Ctrl+S: ends input of any kind.
    Commit,
    Cancel,
    Quit,
}

/// Terminal input the console reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Key(KeyEvent),
    /// Text delivered in one piece by bracketed paste.
    Paste(String),
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

/// Key presses and pastes; everything else is dropped.
#[must_use]
pub fn input(event: Event) -> Option<Input> {
    match event {
        Event::Key(key) if matches!(key.kind, KeyEventKind::Press) => Some(Input::Key(key)),
        Event::Paste(text) => Some(Input::Paste(text)),
        _ => None,
    }
}

/// Map a key to a form action.
#[must_use]
pub fn key_action(key: &KeyEvent) -> Option<KeyAction> {
    if is_ctrl(key, 'c') {
        return Some(KeyAction::Quit);
    }
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('k') => KeyAction::Up,
        KeyCode::Down | KeyCode::Char('j') => KeyAction::Down,
        KeyCode::Enter => KeyAction::Edit,
        KeyCode::Char('c') => KeyAction::CycleChannel,
        KeyCode::Char('a') => KeyAction::AddProcessor,
        KeyCode::Char('p') => KeyAction::CycleProcessor,
        KeyCode::Char('d') | KeyCode::Delete => KeyAction::RemoveProcessor,
        KeyCode::Char('K') => KeyAction::MoveProcessorUp,
        KeyCode::Char('J') => KeyAction::MoveProcessorDown,
        KeyCode::Char('o') => KeyAction::OpenChannel,
        KeyCode::Char('x') => KeyAction::CloseChannel,
        KeyCode::Char('m') => KeyAction::Compose,
        KeyCode::Char('s') => KeyAction::Save,
        KeyCode::Char('l') => KeyAction::Load,
        KeyCode::Char('q') => KeyAction::Quit,
        _ => return None,
    };
    Some(action)
}

/// Map a key to a text-editing action.
#[must_use]
pub fn edit_key(key: &KeyEvent) -> Option<EditKey> {
    if is_ctrl(key, 'c') {
        return Some(EditKey::Quit);
    }
    if is_ctrl(key, 's') {
        return Some(EditKey::Commit);
    }
    match key.code {
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(EditKey::Char(c))
        }
        KeyCode::Backspace => Some(EditKey::Backspace),
        KeyCode::Enter => Some(EditKey::Return),
        KeyCode::Tab => Some(EditKey::Commit),
        KeyCode::Esc => Some(EditKey::Cancel),
        _ => None,
    }
}
