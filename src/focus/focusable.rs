// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::back::RemoteKey;
use super::{FocusKey, FocusStore, ListId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn from_remote(key: RemoteKey) -> Option<Self> {
        match key {
            RemoteKey::Up => Some(Direction::Up),
            RemoteKey::Down => Some(Direction::Down),
            RemoteKey::Left => Some(Direction::Left),
            RemoteKey::Right => Some(Direction::Right),
            _ => None,
        }
    }
}

/// What the application should do in response to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    None,
    OpenCategory(usize),
    PressChannel(usize),
    ToggleFavorite(usize),
    OpenPreviewFullscreen,
    SelectDay(u32),
    Focus(FocusKey),
}

pub trait Focusable {
    fn focus_key(&self) -> FocusKey;

    /// List whose remembered position follows this element.
    fn list(&self) -> Option<ListId> {
        None
    }

    fn activate(&self) -> Intent;

    /// `Some` when the element consumes the move itself.
    fn handle_direction(&self, _dir: Direction) -> Option<Intent> {
        None
    }

    fn on_gain_focus(&self, store: &mut FocusStore) {
        match self.list() {
            Some(list) => store.focus_list(list, self.focus_key()),
            None => store.focus(self.focus_key()),
        }
    }
}

pub struct CategoryRow {
    pub index: usize,
}

impl Focusable for CategoryRow {
    fn focus_key(&self) -> FocusKey {
        FocusKey::category(self.index)
    }

    fn list(&self) -> Option<ListId> {
        Some(ListId::Categories)
    }

    fn activate(&self) -> Intent {
        Intent::OpenCategory(self.index)
    }
}

/// Channel row; Right moves to its favorite toggle.
pub struct ChannelRow {
    pub index: usize,
}

impl Focusable for ChannelRow {
    fn focus_key(&self) -> FocusKey {
        FocusKey::channel_item(self.index)
    }

    fn list(&self) -> Option<ListId> {
        Some(ListId::Channels)
    }

    fn activate(&self) -> Intent {
        Intent::PressChannel(self.index)
    }

    fn handle_direction(&self, dir: Direction) -> Option<Intent> {
        match dir {
            Direction::Right => Some(Intent::Focus(FocusKey::favorite_toggle(self.index))),
            _ => None,
        }
    }
}

pub struct FavoriteToggle {
    pub index: usize,
}

impl Focusable for FavoriteToggle {
    fn focus_key(&self) -> FocusKey {
        FocusKey::favorite_toggle(self.index)
    }

    fn activate(&self) -> Intent {
        Intent::ToggleFavorite(self.index)
    }

    fn handle_direction(&self, dir: Direction) -> Option<Intent> {
        match dir {
            Direction::Left => Some(Intent::Focus(FocusKey::channel_item(self.index))),
            Direction::Up | Direction::Down => Some(Intent::None),
            Direction::Right => None,
        }
    }
}

pub struct PreviewSurface;

impl Focusable for PreviewSurface {
    fn focus_key(&self) -> FocusKey {
        FocusKey::preview()
    }

    fn activate(&self) -> Intent {
        Intent::OpenPreviewFullscreen
    }
}

pub struct DayButton {
    pub offset: u32,
}

impl Focusable for DayButton {
    fn focus_key(&self) -> FocusKey {
        FocusKey::day(self.offset)
    }

    fn activate(&self) -> Intent {
        Intent::SelectDay(self.offset)
    }
}

pub struct ProgramCard {
    pub index: usize,
}

impl Focusable for ProgramCard {
    fn focus_key(&self) -> FocusKey {
        FocusKey::program(self.index)
    }

    fn list(&self) -> Option<ListId> {
        Some(ListId::Epg)
    }

    fn activate(&self) -> Intent {
        Intent::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_row_hands_right_to_favorite() {
        let row = ChannelRow { index: 2 };
        assert_eq!(
            row.handle_direction(Direction::Right),
            Some(Intent::Focus(FocusKey::favorite_toggle(2)))
        );
        assert_eq!(row.handle_direction(Direction::Down), None);
        assert_eq!(row.activate(), Intent::PressChannel(2));

        let toggle = FavoriteToggle { index: 2 };
        assert_eq!(
            toggle.handle_direction(Direction::Left),
            Some(Intent::Focus(FocusKey::channel_item(2)))
        );
        assert_eq!(toggle.activate(), Intent::ToggleFavorite(2));
    }

    #[test]
    fn test_gain_focus_updates_remembered_lists() {
        let mut store = FocusStore::default();

        ProgramCard { index: 4 }.on_gain_focus(&mut store);
        assert_eq!(
            store.snapshot().last_focused(ListId::Epg),
            Some(&FocusKey::program(4))
        );

        PreviewSurface.on_gain_focus(&mut store);
        assert_eq!(store.snapshot().current_focus, Some(FocusKey::preview()));
        assert_eq!(
            store.snapshot().last_focused(ListId::Epg),
            Some(&FocusKey::program(4))
        );
    }

    #[test]
    fn test_activation_intents() {
        assert_eq!(CategoryRow { index: 1 }.activate(), Intent::OpenCategory(1));
        assert_eq!(PreviewSurface.activate(), Intent::OpenPreviewFullscreen);
        assert_eq!(DayButton { offset: 3 }.activate(), Intent::SelectDay(3));
        assert_eq!(ProgramCard { index: 0 }.activate(), Intent::None);
    }
}
