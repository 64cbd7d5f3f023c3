// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

mod common;

use common::{FakeCatalog, channel};
use nimbus::catalog::{ALL_CHANNELS_CATEGORY, Channel, FavoriteRecord};
use nimbus::resolver::{ChannelResolver, Resolution};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn partial(id: u32, name: &str) -> Channel {
    Channel::from(FavoriteRecord {
        stream_id: id,
        name: name.to_string(),
        icon_url: None,
    })
}

fn resolver(catalog: FakeCatalog) -> (ChannelResolver<FakeCatalog>, Arc<FakeCatalog>) {
    let catalog = Arc::new(catalog);
    (ChannelResolver::new(Arc::clone(&catalog)), catalog)
}

#[tokio::test]
async fn test_playable_channel_needs_no_lookup() {
    let (resolver, catalog) = resolver(FakeCatalog::default());
    let ch = channel(7, "News", "http://tv/7");

    let resolution = resolver.resolve(ch.clone()).await;

    assert_eq!(resolution, Resolution::Ready(ch));
    assert_eq!(catalog.channel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_channel_completed_from_catalog() {
    let (resolver, catalog) = resolver(FakeCatalog::with_channels(
        ALL_CHANNELS_CATEGORY,
        vec![
            channel(1, "Sports", "http://tv/1"),
            channel(7, "News HD", "http://tv/7"),
        ],
    ));

    let resolution = resolver.resolve(partial(7, "News")).await;

    assert!(resolution.is_ready());
    let ch = resolution.into_channel();
    assert_eq!(ch.playback_url, "http://tv/7");
    assert_eq!(ch.name, "News HD");
    assert_eq!(catalog.channel_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_channel() {
    let (resolver, _) = resolver(FakeCatalog::with_channels(
        ALL_CHANNELS_CATEGORY,
        vec![channel(1, "Sports", "http://tv/1")],
    ));

    let resolution = resolver.resolve(partial(7, "News")).await;

    assert_eq!(resolution, Resolution::Miss(partial(7, "News")));
    assert!(!resolution.channel().is_playable());
}

#[tokio::test]
async fn test_match_without_url_is_a_miss() {
    let (resolver, _) = resolver(FakeCatalog::with_channels(
        ALL_CHANNELS_CATEGORY,
        vec![channel(7, "News", "")],
    ));

    let resolution = resolver.resolve(partial(7, "News")).await;

    assert!(!resolution.is_ready());
}

#[tokio::test]
async fn test_fetch_error_is_a_miss() {
    let (resolver, catalog) = resolver(FakeCatalog::with_channels(
        ALL_CHANNELS_CATEGORY,
        vec![channel(7, "News", "http://tv/7")],
    ));
    catalog.fail.store(true, Ordering::SeqCst);

    let resolution = resolver.resolve(partial(7, "News")).await;

    assert_eq!(resolution, Resolution::Miss(partial(7, "News")));
}
