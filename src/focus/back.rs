// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Logical remote-control keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Back,
    Char(char),
    Quit,
}

impl RemoteKey {
    pub fn from_key_event(key: &KeyEvent) -> Option<Self> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(RemoteKey::Quit),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Up => Some(RemoteKey::Up),
            KeyCode::Down => Some(RemoteKey::Down),
            KeyCode::Left => Some(RemoteKey::Left),
            KeyCode::Right => Some(RemoteKey::Right),
            KeyCode::Enter => Some(RemoteKey::Enter),
            KeyCode::Esc | KeyCode::Backspace => Some(RemoteKey::Back),
            KeyCode::Char(c) => Some(RemoteKey::Char(c)),
            _ => None,
        }
    }

    /// Maps the numeric key codes that TV platforms deliver for remote buttons.
    ///
    /// The terminal front end goes through `from_key_event`; this is for
    /// embedders whose input source reports raw codes. Back arrives as 10009 on
    /// Tizen, 461 on webOS and 196 on some set-top boxes, besides the browser
    /// Backspace and Escape codes.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            37 => Some(RemoteKey::Left),
            38 => Some(RemoteKey::Up),
            39 => Some(RemoteKey::Right),
            40 => Some(RemoteKey::Down),
            13 => Some(RemoteKey::Enter),
            8 | 27 | 10009 | 461 | 196 => Some(RemoteKey::Back),
            _ => None,
        }
    }
}

pub type BackHandler<C> = Box<dyn FnMut(&mut C) -> bool + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Back handlers, most recently registered first.
///
/// A handler returns `true` to consume the event; otherwise the next older one
/// is tried.
pub struct BackStack<C> {
    next_id: u64,
    handlers: Vec<(HandlerId, BackHandler<C>)>,
}

impl<C> Default for BackStack<C> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }
}

impl<C> BackStack<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, handler: F) -> HandlerId
    where
        F: FnMut(&mut C) -> bool + Send + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Unregisters `id`. Returns whether it was still registered.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(hid, _)| *hid != id);
        self.handlers.len() != before
    }

    pub fn dispatch(&mut self, ctx: &mut C) -> bool {
        self.handlers
            .iter_mut()
            .rev()
            .any(|(_, handler)| handler(&mut *ctx))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_handler_wins() {
        let mut stack: BackStack<Vec<&'static str>> = BackStack::new();
        stack.push(|log| {
            log.push("root");
            true
        });
        let overlay = stack.push(|log| {
            log.push("overlay");
            true
        });

        let mut log = Vec::new();
        assert!(stack.dispatch(&mut log));
        assert_eq!(log, vec!["overlay"]);

        assert!(stack.remove(overlay));
        assert!(!stack.remove(overlay));
        log.clear();
        stack.dispatch(&mut log);
        assert_eq!(log, vec!["root"]);
    }

    #[test]
    fn test_declined_event_falls_through() {
        let mut stack: BackStack<u32> = BackStack::new();
        stack.push(|n| {
            *n += 10;
            true
        });
        stack.push(|n| {
            *n += 1;
            false
        });

        let mut n = 0;
        assert!(stack.dispatch(&mut n));
        assert_eq!(n, 11);
    }

    #[test]
    fn test_empty_stack_does_not_consume() {
        let mut stack: BackStack<()> = BackStack::new();
        assert!(!stack.dispatch(&mut ()));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_remote_back_codes() {
        for code in [10009, 461, 196] {
            assert_eq!(RemoteKey::from_code(code), Some(RemoteKey::Back));
        }
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        let backspace = KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(RemoteKey::from_key_event(&esc), Some(RemoteKey::Back));
        assert_eq!(RemoteKey::from_key_event(&backspace), Some(RemoteKey::Back));
    }
}
