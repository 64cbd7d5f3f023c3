// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs as async_fs;
use tracing::debug;

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

fn short_hash(input: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(len);
    hex
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub created_at: u64,
    pub ttl_seconds: u64,
}

impl CacheMetadata {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            created_at: now_secs(),
            ttl_seconds,
        }
    }

    pub fn is_expired(&self) -> bool {
        now_secs() > self.created_at.saturating_add(self.ttl_seconds)
    }

    pub fn time_until_expiry(&self) -> Duration {
        let expiry_time = self.created_at.saturating_add(self.ttl_seconds);
        Duration::from_secs(expiry_time.saturating_sub(now_secs()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub metadata: CacheMetadata,
    pub data: T,
}

impl<T> CachedData<T> {
    pub fn is_expired(&self) -> bool {
        self.metadata.is_expired()
    }
}

/// Catalog responses cached per logged-in session.
///
/// Layout: `<root>/sessions/<session hash>/<kind>[_<key hash>].json`.
#[derive(Debug, Clone)]
pub struct CacheManager {
    session_dir: PathBuf,
}

impl CacheManager {
    /// Cache for `session_key` under the user cache directory.
    pub fn new(session_key: &str) -> Result<Self> {
        let root = Self::default_root()?;
        Ok(Self::with_root(root, session_key))
    }

    pub fn with_root(root: impl AsRef<Path>, session_key: &str) -> Self {
        Self {
            session_dir: root
                .as_ref()
                .join("sessions")
                .join(short_hash(session_key, 16)),
        }
    }

    pub fn default_root() -> Result<PathBuf> {
        Ok(dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join("nimbus"))
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    fn cache_path(&self, kind: &str, key: Option<&str>) -> PathBuf {
        let filename = match key {
            Some(key) => format!("{}_{}.json", kind, short_hash(key, 8)),
            None => format!("{}.json", kind),
        };
        self.session_dir.join(filename)
    }

    pub async fn get_cached<T>(&self, kind: &str, key: Option<&str>) -> Result<Option<CachedData<T>>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let cache_path = self.cache_path(kind, key);

        if !async_fs::try_exists(&cache_path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = async_fs::read_to_string(&cache_path)
            .await
            .with_context(|| format!("Failed to read cache file: {}", cache_path.display()))?;

        let cached_data: CachedData<T> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache JSON: {}", cache_path.display()))?;

        Ok(Some(cached_data))
    }

    pub async fn store_cache<T>(
        &self,
        kind: &str,
        key: Option<&str>,
        data: &T,
        ttl_seconds: u64,
    ) -> Result<()>
    where
        T: Serialize,
    {
        let cache_path = self.cache_path(kind, key);

        async_fs::create_dir_all(&self.session_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create cache directory: {}",
                    self.session_dir.display()
                )
            })?;

        let cached_data = CachedData {
            metadata: CacheMetadata::new(ttl_seconds),
            data,
        };
        let content = serde_json::to_string_pretty(&cached_data)
            .with_context(|| "Failed to serialize cache data")?;

        async_fs::write(&cache_path, content)
            .await
            .with_context(|| format!("Failed to write cache file: {}", cache_path.display()))?;

        debug!("Cached {} at {}", kind, cache_path.display());
        Ok(())
    }

    /// Removes everything cached for this session.
    pub async fn clear(&self) -> Result<()> {
        if async_fs::try_exists(&self.session_dir).await.unwrap_or(false) {
            async_fs::remove_dir_all(&self.session_dir)
                .await
                .with_context(|| {
                    format!(
                        "Failed to remove session cache directory: {}",
                        self.session_dir.display()
                    )
                })?;
        }
        Ok(())
    }

    /// Removes the cache of every session under `root`.
    pub async fn clear_all(root: impl AsRef<Path>) -> Result<()> {
        let sessions_dir = root.as_ref().join("sessions");
        if async_fs::try_exists(&sessions_dir).await.unwrap_or(false) {
            async_fs::remove_dir_all(&sessions_dir)
                .await
                .with_context(|| {
                    format!(
                        "Failed to remove cache directory: {}",
                        sessions_dir.display()
                    )
                })?;
        }
        Ok(())
    }
}
