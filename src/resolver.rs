// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::{ALL_CHANNELS_CATEGORY, Catalog, Channel};
use std::sync::Arc;
use tracing::{debug, warn};

/// Format requested when fetching the full channel list for resolution.
const RESOLVE_FORMAT: &str = "m3u";

/// Outcome of completing a possibly partial channel record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Playable record, either as given or taken from the catalog
    Ready(Channel),
    /// No playable counterpart was found; carries the original record
    Miss(Channel),
}

impl Resolution {
    pub fn channel(&self) -> &Channel {
        match self {
            Resolution::Ready(channel) | Resolution::Miss(channel) => channel,
        }
    }

    pub fn into_channel(self) -> Channel {
        match self {
            Resolution::Ready(channel) | Resolution::Miss(channel) => channel,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Resolution::Ready(_))
    }
}

/// Completes favorite snapshots against the authoritative channel list.
pub struct ChannelResolver<C> {
    catalog: Arc<C>,
}

impl<C> Clone for ChannelResolver<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<C: Catalog> ChannelResolver<C> {
    pub fn new(catalog: Arc<C>) -> Self {
        Self { catalog }
    }

    /// Never fails: a fetch error is logged and reported as a miss.
    pub async fn resolve(&self, channel: Channel) -> Resolution {
        if channel.is_playable() {
            return Resolution::Ready(channel);
        }

        debug!("Resolving partial channel {}", channel.stream_id);

        let all = match self
            .catalog
            .channels(ALL_CHANNELS_CATEGORY, RESOLVE_FORMAT)
            .await
        {
            Ok(all) => all,
            Err(e) => {
                warn!("Failed to resolve channel {}: {}", channel.stream_id, e);
                return Resolution::Miss(channel);
            }
        };

        match all
            .into_iter()
            .find(|c| c.stream_id == channel.stream_id && c.is_playable())
        {
            Some(found) => Resolution::Ready(found),
            None => {
                warn!(
                    "Channel {} ({}) no longer in catalog",
                    channel.stream_id, channel.name
                );
                Resolution::Miss(channel)
            }
        }
    }
}
