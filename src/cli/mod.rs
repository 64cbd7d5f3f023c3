// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};

use nimbus::catalog::{CatalogClient, Session};
use nimbus::config::Config;
use nimbus::error::NimbusError;
use nimbus::storage::{FavoritesStore, SessionStore};

pub mod api;
pub mod cache;
pub mod favorites;

pub use api::ApiCommand;
pub use cache::CacheCommand;
pub use favorites::FavoritesCommand;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Invalid format: {}. Use 'text' or 'json'", s),
        }
    }
}

/// Context for command execution: configuration plus the stored login.
pub struct CommandContext {
    pub config: Config,
    sessions: SessionStore,
}

impl CommandContext {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            sessions: SessionStore::open_default()?,
        })
    }

    pub fn session(&self) -> Result<Session> {
        self.sessions
            .load()?
            .ok_or(NimbusError::SessionInvalid)
            .context("No stored session. Run 'nimbus login' first")
    }

    pub fn logout(&self) -> Result<()> {
        self.sessions.clear()
    }

    pub fn catalog(&self, show_progress: bool) -> Result<CatalogClient> {
        let client = CatalogClient::new(&self.config.backend, self.session()?)?
            .with_cache(&self.config.cache)
            .with_progress(show_progress);
        Ok(client)
    }

    pub fn favorites(&self) -> Result<FavoritesStore> {
        FavoritesStore::open_default()
    }
}
