//! Key bindings: normal and vim-style, plus per-frame edge-triggered action state.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};

/// Walking keys without a release event stop after this long.
const HOLD_TIMEOUT_MS: u64 = 500;

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    WalkLeft,
    WalkRight,
    RotateLeft,
    RotateRight,
    Place,
    FlipGravity,
    Pause,
    Quit,
    None,
}

/// Map key event to game action. Supports both normal (arrows, WASD) and vim (hjkl, etc.).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Esc => Action::Quit,
        KeyCode::Char('p' | 'P') => Action::Pause,
        KeyCode::Left | KeyCode::Char('a' | 'A' | 'h') => Action::WalkLeft,
        KeyCode::Right | KeyCode::Char('d' | 'D' | 'l') => Action::WalkRight,
        KeyCode::Char('q' | 'Q' | 'z' | 'u') => Action::RotateLeft,
        KeyCode::Up | KeyCode::Char('e' | 'E' | 'x' | 'k') => Action::RotateRight,
        KeyCode::Enter | KeyCode::Down | KeyCode::Char(' ' | 's' | 'S' | 'j') => Action::Place,
        KeyCode::Char('f' | 'F' | 'g') => Action::FlipGravity,
        _ => Action::None,
    }
}

/// Actions gathered between two frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameActions {
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub place: bool,
    pub flip_gravity: bool,
    pub pause: bool,
    pub quit: bool,
}

/// Collects key events into edge-triggered actions and a held walking direction.
#[derive(Debug, Default)]
pub struct InputState {
    pending: FrameActions,
    left_held: Option<Instant>,
    right_held: Option<Instant>,
}

impl InputState {
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        let action = key_to_action(key);
        match key.kind {
            KeyEventKind::Release => match action {
                Action::WalkLeft => self.left_held = None,
                Action::WalkRight => self.right_held = None,
                _ => {}
            },
            KeyEventKind::Repeat => match action {
                Action::WalkLeft => self.left_held = Some(now),
                Action::WalkRight => self.right_held = Some(now),
                _ => {}
            },
            KeyEventKind::Press => self.press(action, now),
        }
    }

    pub fn press(&mut self, action: Action, now: Instant) {
        match action {
            Action::WalkLeft => {
                self.left_held = Some(now);
                self.right_held = None;
            }
            Action::WalkRight => {
                self.right_held = Some(now);
                self.left_held = None;
            }
            Action::RotateLeft => self.pending.rotate_left = true,
            Action::RotateRight => self.pending.rotate_right = true,
            Action::Place => self.pending.place = true,
            Action::FlipGravity => self.pending.flip_gravity = true,
            Action::Pause => self.pending.pause = true,
            Action::Quit => self.pending.quit = true,
            Action::None => {}
        }
    }

    /// Returns and clears this frame's one-shot actions.
    pub fn take_actions(&mut self) -> FrameActions {
        std::mem::take(&mut self.pending)
    }

    /// -1, 0 or 1. Expires holds whose key stopped repeating.
    pub fn walk_direction(&mut self, now: Instant) -> f32 {
        let timeout = Duration::from_millis(HOLD_TIMEOUT_MS);
        for held in [&mut self.left_held, &mut self.right_held] {
            if held.is_some_and(|t| now.saturating_duration_since(t) > timeout) {
                *held = None;
            }
        }
        match (self.left_held.is_some(), self.right_held.is_some()) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    pub fn release_all(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn test_bindings() {
        assert_eq!(key_to_action(KeyEvent::from(KeyCode::Char('q'))), Action::RotateLeft);
        assert_eq!(key_to_action(KeyEvent::from(KeyCode::Up)), Action::RotateRight);
        assert_eq!(key_to_action(KeyEvent::from(KeyCode::Char(' '))), Action::Place);
        assert_eq!(key_to_action(KeyEvent::from(KeyCode::Char('f'))), Action::FlipGravity);
        assert_eq!(key_to_action(KeyEvent::from(KeyCode::Esc)), Action::Quit);
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::ALT)),
            Action::None
        );
    }

    #[test]
    fn test_actions_fire_once_per_press() {
        let mut input = InputState::default();
        let now = Instant::now();
        input.handle_key(key(KeyCode::Char('e'), KeyEventKind::Press), now);
        input.handle_key(key(KeyCode::Char('e'), KeyEventKind::Repeat), now);
        let first = input.take_actions();
        assert!(first.rotate_right);
        assert_eq!(input.take_actions(), FrameActions::default());
    }

    #[test]
    fn test_walk_hold_and_release() {
        let mut input = InputState::default();
        let now = Instant::now();
        input.handle_key(key(KeyCode::Left, KeyEventKind::Press), now);
        assert_eq!(input.walk_direction(now), -1.0);
        input.handle_key(key(KeyCode::Left, KeyEventKind::Release), now);
        assert_eq!(input.walk_direction(now), 0.0);

        input.handle_key(key(KeyCode::Right, KeyEventKind::Press), now);
        let later = now + Duration::from_millis(HOLD_TIMEOUT_MS + 50);
        assert_eq!(input.walk_direction(later), 0.0);
    }
}
