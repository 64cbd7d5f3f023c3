// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::CommandContext;
use anyhow::Result;

use nimbus::cache::CacheManager;

pub enum CacheCommand {
    /// Clear the signed-in account's cache, or every account's
    Clear { all: bool },
}

impl CacheCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        match self {
            Self::Clear { all: true } => {
                let root = CacheManager::default_root()?;
                eprintln!("Clearing all cached data...");
                CacheManager::clear_all(&root).await?;
                println!("Cache cleared");
            }
            Self::Clear { all: false } => {
                let catalog = context.catalog(false)?;
                let username = catalog.session().username.clone();
                match catalog.cache() {
                    Some(cache) => {
                        eprintln!("Clearing cache for {}...", username);
                        if let Err(e) = cache.clear().await {
                            eprintln!("Warning: Failed to clear cache for {}: {}", username, e);
                        } else {
                            println!("Cache cleared for {}", username);
                        }
                    }
                    None => println!("Caching is disabled"),
                }
            }
        }

        Ok(())
    }
}
