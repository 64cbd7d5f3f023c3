// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat};
use anyhow::Result;
use std::sync::Arc;

use nimbus::catalog::Channel;
use nimbus::resolver::{ChannelResolver, Resolution};

pub enum FavoritesCommand {
    List { format: OutputFormat },
    /// Look every favorite up in the live catalog
    Resolve,
}

impl FavoritesCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let session = context.session()?;
        let favorites = context.favorites()?;
        let records = favorites.channels(&session.scope_key());

        match self {
            Self::List { format } => match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("No favorites for {}", session.username);
                    }
                    for record in records {
                        println!("{:>8}  {}", record.stream_id, record.name);
                    }
                }
            },
            Self::Resolve => {
                let resolver = ChannelResolver::new(Arc::new(context.catalog(true)?));
                for record in records {
                    match resolver.resolve(Channel::from(record.clone())).await {
                        Resolution::Ready(channel) => {
                            println!("✓ {} -> {}", channel.name, channel.playback_url)
                        }
                        Resolution::Miss(channel) => {
                            println!("✗ {} (no longer available)", channel.name)
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
