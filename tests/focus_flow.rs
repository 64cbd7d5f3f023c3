// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Remote-control walk-throughs across focus, back handling and resolution.

mod common;

use common::{FakeCatalog, channel};
use nimbus::catalog::{ALL_CHANNELS_CATEGORY, Channel, FavoriteRecord};
use nimbus::focus::activation::Press;
use nimbus::focus::back::{BackStack, RemoteKey};
use nimbus::focus::{FocusError, FocusKey, FocusStore, FullscreenOrigin, ListId, NavPhase};
use nimbus::resolver::ChannelResolver;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_millis(400);

#[test]
fn test_double_press_opens_fullscreen_and_back_restores_focus() {
    let mut focus = FocusStore::new(WINDOW);
    let mut back: BackStack<FocusStore> = BackStack::new();
    let ch = channel(3, "Music", "http://tv/3");
    let key = FocusKey::channel_item(3);
    let t0 = Instant::now();

    focus.focus_list(ListId::Channels, key.clone());
    assert_eq!(focus.press_channel(&key, 3, t0), Press::Preview);
    focus.select(ch.clone()).unwrap();
    assert_eq!(focus.snapshot().phase(), NavPhase::Selected);

    let second = t0 + Duration::from_millis(150);
    assert_eq!(focus.press_channel(&key, 3, second), Press::Confirm);
    focus
        .open_fullscreen(ch, FullscreenOrigin::Item(key.clone()))
        .unwrap();
    let handler = back.push(|focus: &mut FocusStore| focus.close_fullscreen().is_ok());

    assert_eq!(focus.snapshot().phase(), NavPhase::Fullscreen);
    assert_eq!(
        focus.snapshot().current_focus,
        Some(FocusKey::fullscreen())
    );
    assert!(!focus.is_armed(second));

    assert!(back.dispatch(&mut focus));
    assert!(back.remove(handler));
    assert!(back.is_empty());

    let state = focus.snapshot();
    assert_eq!(state.phase(), NavPhase::Selected);
    assert_eq!(state.current_focus.as_ref(), Some(&key));
    assert_eq!(state.last_focused(ListId::Channels), Some(&key));
    assert!(state.is_selected(3));

    // Nothing left to close
    assert!(!back.dispatch(&mut focus));
}

#[test]
fn test_slow_second_press_only_previews() {
    let mut focus = FocusStore::new(WINDOW);
    let key = FocusKey::channel_item(0);
    let t0 = Instant::now();

    assert_eq!(focus.press_channel(&key, 10, t0), Press::Preview);
    let late = t0 + WINDOW + Duration::from_millis(1);
    assert_eq!(focus.press_channel(&key, 10, late), Press::Preview);
    assert!(focus.is_armed(late));
}

#[test]
fn test_press_on_other_row_previews_it() {
    let mut focus = FocusStore::new(WINDOW);
    let t0 = Instant::now();

    assert_eq!(
        focus.press_channel(&FocusKey::channel_item(0), 10, t0),
        Press::Preview
    );
    assert_eq!(
        focus.press_channel(&FocusKey::channel_item(1), 11, t0 + Duration::from_millis(50)),
        Press::Preview
    );
}

#[test]
fn test_subscribers_see_fullscreen_transitions() {
    let mut focus = FocusStore::new(WINDOW);
    let rx = focus.subscribe();
    let ch = channel(5, "Docs", "http://tv/5");

    focus.select(ch.clone()).unwrap();
    focus.open_fullscreen(ch, FullscreenOrigin::Preview).unwrap();
    assert!(rx.borrow().is_fullscreen());

    assert_eq!(focus.close_fullscreen(), Ok(FocusKey::preview()));
    assert!(!rx.borrow().is_fullscreen());
    assert_eq!(focus.close_fullscreen(), Err(FocusError::NotFullscreen));
}

#[tokio::test]
async fn test_favorite_must_resolve_before_fullscreen() {
    let catalog = Arc::new(FakeCatalog::with_channels(
        ALL_CHANNELS_CATEGORY,
        vec![channel(8, "Film", "http://tv/8")],
    ));
    let resolver = ChannelResolver::new(catalog);
    let mut focus = FocusStore::new(WINDOW);
    let key = FocusKey::channel_item(0);

    let favorite = Channel::from(FavoriteRecord {
        stream_id: 8,
        name: "Film".to_string(),
        icon_url: None,
    });
    focus.select(favorite.clone()).unwrap();

    assert_eq!(
        focus.open_fullscreen(favorite.clone(), FullscreenOrigin::Item(key.clone())),
        Err(FocusError::Unplayable(8))
    );
    assert_eq!(focus.snapshot().phase(), NavPhase::Selected);

    let resolved = resolver.resolve(favorite).await.into_channel();
    focus.select(resolved.clone()).unwrap();
    focus
        .open_fullscreen(resolved, FullscreenOrigin::Item(key))
        .unwrap();
    assert_eq!(
        focus
            .snapshot()
            .selected_channel
            .as_ref()
            .map(|c| c.playback_url.as_str()),
        Some("http://tv/8")
    );
}

#[test]
fn test_category_change_clears_selection() {
    let mut focus = FocusStore::new(WINDOW);
    focus.focus_list(ListId::Categories, FocusKey::category(2));
    focus.focus_list(ListId::Channels, FocusKey::channel_item(4));
    focus.select(channel(4, "Kids", "http://tv/4")).unwrap();

    focus.reset_for_category_change();

    let state = focus.snapshot();
    assert_eq!(state.phase(), NavPhase::Idle);
    assert_eq!(state.last_focused(ListId::Channels), None);
    assert_eq!(
        state.last_focused(ListId::Categories),
        Some(&FocusKey::category(2))
    );
}

#[test]
fn test_remote_back_code_closes_fullscreen() {
    let mut focus = FocusStore::new(WINDOW);
    let mut back: BackStack<FocusStore> = BackStack::new();
    let ch = channel(6, "News", "http://tv/6");
    focus.select(ch.clone()).unwrap();
    focus.open_fullscreen(ch, FullscreenOrigin::Preview).unwrap();
    back.push(|focus: &mut FocusStore| focus.close_fullscreen().is_ok());

    // Tizen remote Back
    let key = RemoteKey::from_code(10009);
    assert_eq!(key, Some(RemoteKey::Back));
    assert!(back.dispatch(&mut focus));
    assert_eq!(focus.snapshot().phase(), NavPhase::Selected);
    assert_eq!(focus.snapshot().current_focus, Some(FocusKey::preview()));

    // Unknown codes are ignored
    assert_eq!(RemoteKey::from_code(403), None);
}
