// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Focus, selection and fullscreen state for remote-control navigation.
//!
//! There is one [`FocusStore`] per application. It is passed by `&mut` to the
//! code handling a key, so a transition is always observed whole; observers that
//! live elsewhere (the player task, tests) subscribe to committed snapshots.
//!
//! ```text
//! Idle --select--> Selected --open_fullscreen--> Fullscreen
//!   ^                 ^  \                          |
//!   |                 |   `----- close_fullscreen --'
//!   `-- reset_for_category_change / reset_all
//! ```

pub mod activation;
pub mod back;
pub mod focusable;

use crate::catalog::Channel;
use activation::{Press, TwoStepActivation};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// Lists that remember their last focused row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListId {
    Categories,
    Channels,
    Epg,
}

/// Stable identifier of a focusable element, e.g. `channel-item-3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FocusKey(String);

impl FocusKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn category(index: usize) -> Self {
        Self(format!("category-{}", index))
    }

    pub fn channel_item(index: usize) -> Self {
        Self(format!("channel-item-{}", index))
    }

    pub fn favorite_toggle(index: usize) -> Self {
        Self(format!("favorite-{}", index))
    }

    pub fn day(offset: u32) -> Self {
        Self(format!("day-{}", offset))
    }

    pub fn program(index: usize) -> Self {
        Self(format!("program-{}", index))
    }

    pub fn preview() -> Self {
        Self("channel-preview".to_string())
    }

    pub fn fullscreen() -> Self {
        Self("fullscreen-player".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing row index for keys of the form `<prefix>-<n>`.
    pub fn index_for(&self, prefix: &str) -> Option<usize> {
        self.0
            .strip_prefix(prefix)?
            .strip_prefix('-')?
            .parse()
            .ok()
    }
}

impl fmt::Display for FocusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What opened the fullscreen player, and so where focus returns on close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullscreenOrigin {
    Preview,
    Item(FocusKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    Idle,
    Selected,
    Fullscreen,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FocusError {
    #[error("Channel {0} has no playback URL")]
    Unplayable(u32),
    #[error("Fullscreen is already open")]
    AlreadyFullscreen,
    #[error("Fullscreen is not open")]
    NotFullscreen,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusState {
    pub selected_channel: Option<Channel>,
    pub last_focused: BTreeMap<ListId, FocusKey>,
    pub fullscreen: Option<FullscreenOrigin>,
    pub current_focus: Option<FocusKey>,
}

impl FocusState {
    pub fn phase(&self) -> NavPhase {
        if self.fullscreen.is_some() {
            NavPhase::Fullscreen
        } else if self.selected_channel.is_some() {
            NavPhase::Selected
        } else {
            NavPhase::Idle
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.is_some()
    }

    pub fn last_focused(&self, list: ListId) -> Option<&FocusKey> {
        self.last_focused.get(&list)
    }

    pub fn is_selected(&self, stream_id: u32) -> bool {
        self.selected_channel
            .as_ref()
            .is_some_and(|c| c.stream_id == stream_id)
    }
}

pub struct FocusStore {
    state: FocusState,
    activation: TwoStepActivation,
    tx: watch::Sender<FocusState>,
}

impl Default for FocusStore {
    fn default() -> Self {
        Self::new(activation::DEFAULT_WINDOW)
    }
}

impl FocusStore {
    pub fn new(double_press_window: Duration) -> Self {
        let (tx, _) = watch::channel(FocusState::default());
        Self {
            state: FocusState::default(),
            activation: TwoStepActivation::new(double_press_window),
            tx,
        }
    }

    pub fn snapshot(&self) -> &FocusState {
        &self.state
    }

    /// Receives a fresh snapshot after every committed transition.
    pub fn subscribe(&self) -> watch::Receiver<FocusState> {
        self.tx.subscribe()
    }

    fn commit(&mut self) {
        self.tx.send_replace(self.state.clone());
    }

    /// Moves focus to `key` inside `list` without touching the selection.
    pub fn focus_list(&mut self, list: ListId, key: FocusKey) {
        if self.state.last_focused.get(&list) == Some(&key)
            && self.state.current_focus.as_ref() == Some(&key)
        {
            return;
        }
        self.state.last_focused.insert(list, key.clone());
        self.state.current_focus = Some(key);
        self.commit();
    }

    /// Focus on an element that belongs to no remembered list.
    pub fn focus(&mut self, key: FocusKey) {
        if self.state.current_focus.as_ref() == Some(&key) {
            return;
        }
        self.state.current_focus = Some(key);
        self.commit();
    }

    /// Makes `channel` the previewed channel.
    ///
    /// While fullscreen the replacement must be playable.
    pub fn select(&mut self, channel: Channel) -> Result<(), FocusError> {
        if self.state.is_fullscreen() && !channel.is_playable() {
            return Err(FocusError::Unplayable(channel.stream_id));
        }
        debug!("Selected channel {} ({})", channel.stream_id, channel.name);
        self.state.selected_channel = Some(channel);
        self.commit();
        Ok(())
    }

    /// Feeds a confirm press on a channel row into the two-step protocol.
    pub fn press_channel(&mut self, key: &FocusKey, stream_id: u32, now: Instant) -> Press {
        let already_selected = self.state.is_selected(stream_id);
        self.activation.press(key, now, already_selected)
    }

    pub fn is_armed(&self, now: Instant) -> bool {
        self.activation.is_armed(now)
    }

    pub fn open_fullscreen(
        &mut self,
        channel: Channel,
        origin: FullscreenOrigin,
    ) -> Result<(), FocusError> {
        if self.state.is_fullscreen() {
            return Err(FocusError::AlreadyFullscreen);
        }
        if !channel.is_playable() {
            return Err(FocusError::Unplayable(channel.stream_id));
        }

        debug!("Opening fullscreen for {} from {:?}", channel.stream_id, origin);
        self.activation.disarm();
        self.state.selected_channel = Some(channel);
        self.state.fullscreen = Some(origin);
        self.state.current_focus = Some(FocusKey::fullscreen());
        self.commit();
        Ok(())
    }

    /// Leaves fullscreen and returns the key that regained focus.
    pub fn close_fullscreen(&mut self) -> Result<FocusKey, FocusError> {
        let origin = self
            .state
            .fullscreen
            .take()
            .ok_or(FocusError::NotFullscreen)?;

        let restored = match origin {
            FullscreenOrigin::Preview => FocusKey::preview(),
            FullscreenOrigin::Item(key) => key,
        };
        debug!("Closing fullscreen, focus back to {}", restored);
        self.state.current_focus = Some(restored.clone());
        self.commit();
        Ok(restored)
    }

    pub fn reset_for_category_change(&mut self) {
        self.activation.disarm();
        self.state.selected_channel = None;
        self.state.fullscreen = None;
        self.state.last_focused.remove(&ListId::Channels);
        self.commit();
    }

    pub fn reset_for_channel_change(&mut self) {
        if self.state.last_focused.remove(&ListId::Epg).is_some() {
            self.commit();
        }
    }

    pub fn reset_all(&mut self) {
        self.activation.disarm();
        self.state = FocusState::default();
        self.commit();
    }
}
