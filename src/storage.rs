// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::{Channel, FavoriteRecord, Session};
use crate::config::Config;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Stored login, kept in the config directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("session.json"),
        }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Config::ensure_config_dir()?))
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;

        let session: Session =
            serde_json::from_str(&content).with_context(|| "Failed to parse session JSON")?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        write_json(&self.path, session)
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove session file: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FavoritesData {
    pub channels: Vec<FavoriteRecord>,
    pub movies: Vec<Value>,
    pub series: Vec<Value>,
}

/// Favorite channels per account, keyed by `"{server_code}:{username}"`.
#[derive(Debug)]
pub struct FavoritesStore {
    path: PathBuf,
    favorites: BTreeMap<String, FavoritesData>,
}

impl FavoritesStore {
    /// Loads `favorites.json` from `dir`. An unreadable file starts empty.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join("favorites.json");
        let favorites = match Self::read(&path) {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!("Ignoring favorites file: {:#}", e);
                BTreeMap::new()
            }
        };
        Self { path, favorites }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::open(Config::ensure_config_dir()?))
    }

    fn read(path: &Path) -> Result<BTreeMap<String, FavoritesData>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read favorites file: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse favorites JSON")
    }

    fn save(&self) -> Result<()> {
        write_json(&self.path, &self.favorites)
    }

    pub fn channels(&self, scope: &str) -> &[FavoriteRecord] {
        self.favorites
            .get(scope)
            .map(|data| data.channels.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_favorite(&self, scope: &str, stream_id: u32) -> bool {
        self.channels(scope).iter().any(|c| c.stream_id == stream_id)
    }

    /// Adds or removes `channel`; returns whether it is a favorite afterwards.
    ///
    /// The in-memory list is restored if the file cannot be written.
    pub fn toggle(&mut self, scope: &str, channel: &Channel) -> Result<bool> {
        let previous = self.favorites.get(scope).cloned();
        let data = self.favorites.entry(scope.to_string()).or_default();

        let now_favorite = if data.channels.iter().any(|c| c.stream_id == channel.stream_id) {
            data.channels.retain(|c| c.stream_id != channel.stream_id);
            false
        } else {
            data.channels.push(FavoriteRecord::from(channel));
            true
        };

        if let Err(e) = self.save() {
            match previous {
                Some(previous) => self.favorites.insert(scope.to_string(), previous),
                None => self.favorites.remove(scope),
            };
            return Err(e);
        }

        debug!(
            "Favorite {} {} for {}",
            channel.stream_id,
            if now_favorite { "added" } else { "removed" },
            scope
        );
        Ok(now_favorite)
    }

    pub fn clear(&mut self, scope: &str) -> Result<()> {
        if let Some(previous) = self.favorites.remove(scope) {
            if let Err(e) = self.save() {
                self.favorites.insert(scope.to_string(), previous);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: u32, name: &str) -> Channel {
        Channel {
            stream_id: id,
            name: name.to_string(),
            icon_url: None,
            playback_url: format!("http://cdn/{}.ts", id),
            category_id: "1".to_string(),
            num: None,
            stream_type: None,
            epg_channel_id: None,
        }
    }

    #[test]
    fn test_session_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        let session = Session {
            server_code: "S1".into(),
            username: "ann".into(),
            password: "pw".into(),
        };
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_toggle_persists_snapshot_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FavoritesStore::open(dir.path());

        assert!(store.toggle("S1:ann", &channel(5, "News")).unwrap());
        assert!(store.is_favorite("S1:ann", 5));
        assert!(!store.is_favorite("S1:bob", 5));

        let raw = fs::read_to_string(dir.path().join("favorites.json")).unwrap();
        assert!(!raw.contains("http://cdn"));

        let reopened = FavoritesStore::open(dir.path());
        assert_eq!(reopened.channels("S1:ann").len(), 1);
        assert_eq!(reopened.channels("S1:ann")[0].name, "News");

        assert!(!store.toggle("S1:ann", &channel(5, "News")).unwrap());
        assert!(store.channels("S1:ann").is_empty());
    }

    #[test]
    fn test_clear_only_touches_one_account() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FavoritesStore::open(dir.path());
        store.toggle("S1:ann", &channel(1, "A")).unwrap();
        store.toggle("S1:bob", &channel(2, "B")).unwrap();

        store.clear("S1:ann").unwrap();
        assert!(store.channels("S1:ann").is_empty());
        assert_eq!(store.channels("S1:bob").len(), 1);
    }

    #[test]
    fn test_failed_write_reverts_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut store = FavoritesStore::open(&missing);

        assert!(store.toggle("S1:ann", &channel(3, "C")).is_err());
        assert!(!store.is_favorite("S1:ann", 3));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("favorites.json"), "{not json").unwrap();
        let store = FavoritesStore::open(dir.path());
        assert!(store.channels("S1:ann").is_empty());
    }
}
