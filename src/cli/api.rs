// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::CommandContext;
use anyhow::Result;
use chrono::{NaiveDate, Utc};

use nimbus::catalog::{ALL_CHANNELS_CATEGORY, encode_channel_id};
use nimbus::epg::local_today;

/// Raw backend calls; responses are printed without interpretation.
pub enum ApiCommand {
    Categories,
    Channels {
        category: Option<String>,
        format: Option<String>,
    },
    Epg {
        channel: String,
        date: Option<NaiveDate>,
    },
}

impl ApiCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let catalog = context.catalog(false)?;

        let result = match self {
            Self::Categories => catalog.get_raw("api/channels/categories", &[]).await?,
            Self::Channels { category, format } => {
                let category = category.unwrap_or_else(|| ALL_CHANNELS_CATEGORY.to_string());
                let format =
                    format.unwrap_or_else(|| context.config.backend.channel_format.clone());
                let path = format!(
                    "api/channels/categories/{}",
                    urlencoding::encode(&category)
                );
                catalog.get_raw(&path, &[("format", format.as_str())]).await?
            }
            Self::Epg { channel, date } => {
                let date = date.unwrap_or_else(|| local_today(Utc::now()));
                let path = format!("api/epg/{}", encode_channel_id(&channel));
                let date = date.format("%Y-%m-%d").to_string();
                catalog.get_raw(&path, &[("date", date.as_str())]).await?
            }
        };

        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }
}
