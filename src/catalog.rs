// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Backend catalog: categories, channel lists, EPG listings and authentication.

use crate::cache::CacheManager;
use crate::config::{BackendConfig, CacheConfig};
use crate::error::{NimbusError, NimbusResult};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};
use url::Url;

/// Category id the backend treats as "every channel".
pub const ALL_CHANNELS_CATEGORY: &str = "0";

/// Client-side category listing the user's favorite channels.
pub const FAVORITES_CATEGORY: &str = "favorites";

fn deserialize_number_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(D::Error::custom("Expected string or number")),
    }
}

fn deserialize_optional_number_as_string<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(D::Error::custom("Expected string, number, or null")),
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match &value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("Invalid id: {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("Invalid id: {:?}", s))),
        _ => Err(D::Error::custom("Expected numeric id")),
    }
}

fn deserialize_optional_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;

    Ok(match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Epoch seconds given as a number or a numeric string. Anything else is `None`.
fn deserialize_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;

    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// Login credentials for one backend account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub server_code: String,
    pub username: String,
    pub password: String,
}

impl Session {
    /// Key scoping per-account state such as favorites.
    pub fn scope_key(&self) -> String {
        format!("{}:{}", self.server_code, self.username)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub username: String,
    pub status: Option<String>,
    #[serde(deserialize_with = "deserialize_epoch")]
    pub exp_date: Option<i64>,
    #[serde(deserialize_with = "deserialize_optional_number_as_string")]
    pub is_trial: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_number_as_string")]
    pub active_cons: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_number_as_string")]
    pub max_connections: Option<String>,
    pub allowed_output_formats: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(rename = "userInfo", default)]
    user_info: Option<UserInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub category_id: String,
    pub category_name: String,
    #[serde(default, deserialize_with = "deserialize_optional_u32")]
    pub parent_id: Option<u32>,
}

impl Category {
    pub fn favorites() -> Self {
        Self {
            category_id: FAVORITES_CATEGORY.to_string(),
            category_name: "Favorites".to_string(),
            parent_id: None,
        }
    }

    pub fn is_favorites(&self) -> bool {
        self.category_id == FAVORITES_CATEGORY
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.category_name)
    }
}

/// A live channel as listed by the backend.
///
/// Records built from favorites are partial: they carry no `playback_url` until
/// resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(deserialize_with = "deserialize_id")]
    pub stream_id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(
        rename = "stream_icon",
        default,
        deserialize_with = "deserialize_optional_number_as_string"
    )]
    pub icon_url: Option<String>,
    #[serde(
        rename = "url",
        default,
        deserialize_with = "deserialize_number_as_string"
    )]
    pub playback_url: String,
    #[serde(default, deserialize_with = "deserialize_number_as_string")]
    pub category_id: String,
    #[serde(default, deserialize_with = "deserialize_optional_u32")]
    pub num: Option<u32>,
    #[serde(default)]
    pub stream_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub epg_channel_id: Option<String>,
}

impl Channel {
    pub fn is_playable(&self) -> bool {
        !self.playback_url.trim().is_empty()
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Snapshot of a channel kept in the favorites store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub stream_id: u32,
    pub name: String,
    #[serde(rename = "stream_icon", default)]
    pub icon_url: Option<String>,
}

impl From<&Channel> for FavoriteRecord {
    fn from(channel: &Channel) -> Self {
        Self {
            stream_id: channel.stream_id,
            name: channel.name.clone(),
            icon_url: channel.icon_url.clone(),
        }
    }
}

impl From<FavoriteRecord> for Channel {
    fn from(record: FavoriteRecord) -> Self {
        Self {
            stream_id: record.stream_id,
            name: record.name,
            icon_url: record.icon_url,
            playback_url: String::new(),
            category_id: FAVORITES_CATEGORY.to_string(),
            num: None,
            stream_type: Some("live".to_string()),
            epg_channel_id: None,
        }
    }
}

/// Raw EPG entry. Entries without usable timestamps are dropped when mapped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpgListing {
    #[serde(deserialize_with = "deserialize_optional_number_as_string")]
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "deserialize_epoch")]
    pub start_timestamp: Option<i64>,
    #[serde(deserialize_with = "deserialize_epoch")]
    pub stop_timestamp: Option<i64>,
}

/// Read access to the backend catalog.
pub trait Catalog: Send + Sync {
    fn categories(&self) -> impl Future<Output = NimbusResult<Vec<Category>>> + Send;

    fn channels(
        &self,
        category_id: &str,
        format: &str,
    ) -> impl Future<Output = NimbusResult<Vec<Channel>>> + Send;

    fn epg(
        &self,
        channel_id: &str,
        date: NaiveDate,
    ) -> impl Future<Output = NimbusResult<Vec<EpgListing>>> + Send;
}

/// Accepts either a bare JSON array or an object wrapping the array under `key`.
///
/// Elements that fail to decode are skipped with a warning.
pub fn normalize_list<T: DeserializeOwned>(value: Value, key: &str) -> Vec<T> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping malformed {} entry: {}", key, e);
                None
            }
        })
        .collect()
}

/// Path segment for an EPG channel id; dots are escaped too.
pub fn encode_channel_id(channel_id: &str) -> String {
    urlencoding::encode(channel_id).replace('.', "%2E")
}

/// HTTP implementation of [`Catalog`] with an on-disk fallback cache.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    session: Session,
    cache: Option<CacheManager>,
    cache_ttl: u64,
    show_progress: bool,
}

impl CatalogClient {
    pub fn new(backend: &BackendConfig, session: Session) -> NimbusResult<Self> {
        let url = Url::parse(&backend.api_base)
            .map_err(|e| NimbusError::Network(format!("Invalid backend URL: {}", e)))?;

        let base_url = url.as_str().trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(backend.timeout())
            .user_agent(backend.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url,
            session,
            cache: None,
            cache_ttl: 0,
            show_progress: false,
        })
    }

    /// Enables the fallback cache for this session.
    pub fn with_cache(mut self, cache_config: &CacheConfig) -> Self {
        if !cache_config.enabled {
            return self;
        }
        match CacheManager::new(&self.cache_key()) {
            Ok(cache) => {
                self.cache = Some(cache);
                self.cache_ttl = cache_config.ttl_secs;
            }
            Err(e) => warn!("Catalog cache disabled: {:#}", e),
        }
        self
    }

    pub fn with_cache_manager(mut self, cache: CacheManager, ttl_secs: u64) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl_secs;
        self
    }

    /// Shows a spinner on stderr while downloading; only for command-line use.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> Option<&CacheManager> {
        self.cache.as_ref()
    }

    pub fn cache_key(&self) -> String {
        format!("{}|{}", self.base_url, self.session.scope_key())
    }

    fn endpoint(&self, path: &str) -> NimbusResult<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| NimbusError::Network(format!("Invalid request URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("server_code", &self.session.server_code)
            .append_pair("username", &self.session.username)
            .append_pair("password", &self.session.password);
        Ok(url)
    }

    /// Verifies the credentials against the backend.
    pub async fn authenticate(&self) -> NimbusResult<UserInfo> {
        let url = format!("{}/api/client-access", self.base_url);
        debug!("Authenticating {} at {}", self.session.username, url);

        let response = self
            .client
            .post(&url)
            .json(&self.session)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(NimbusError::InvalidCredentials);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(NimbusError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NimbusError::Server(status.as_u16(), text));
        }

        let auth: AuthResponse = response.json().await?;
        Ok(auth.user_info.unwrap_or_else(|| UserInfo {
            username: self.session.username.clone(),
            ..UserInfo::default()
        }))
    }

    /// Raw JSON from `path`, without cache or normalization.
    pub async fn get_raw(&self, path: &str, query: &[(&str, &str)]) -> NimbusResult<Value> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        self.fetch_json(url).await
    }

    async fn fetch_json(&self, url: Url) -> NimbusResult<Value> {
        debug!("Requesting {}", url.path());

        let pb = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} [{elapsed_precise}] {bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message("Sending request...");
            Some(pb)
        } else {
            None
        };

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            if let Some(pb) = &pb {
                pb.finish_and_clear();
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(NimbusError::SessionInvalid);
            }
            let text = response.text().await.unwrap_or_default();
            return Err(NimbusError::Server(status.as_u16(), text));
        }

        let mut response_bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = futures_util::StreamExt::next(&mut stream).await {
            let chunk = chunk?;
            response_bytes.extend_from_slice(&chunk);
            if let Some(pb) = &pb {
                pb.set_position(response_bytes.len() as u64);
                pb.set_message("Downloading...");
            }
        }

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        debug!("Response size: {} bytes", response_bytes.len());

        if response_bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Array(Vec::new()));
        }

        serde_json::from_slice(&response_bytes).map_err(|e| {
            warn!(
                "JSON parsing failed at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            );
            NimbusError::from(e)
        })
    }

    /// Network first; on a transport failure falls back to the cached copy.
    async fn fetch_list<T>(&self, url: Url, key: &str, cache_key: Option<&str>) -> NimbusResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        match self.fetch_json(url).await {
            Ok(value) => {
                let items: Vec<T> = normalize_list(value, key);
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache
                        .store_cache(key, cache_key, &items, self.cache_ttl)
                        .await
                    {
                        warn!("Failed to cache {}: {:#}", key, e);
                    }
                }
                Ok(items)
            }
            Err(err) if err.is_retryable() => {
                let Some(cache) = &self.cache else {
                    return Err(err);
                };
                match cache.get_cached::<Vec<T>>(key, cache_key).await {
                    Ok(Some(cached)) => {
                        warn!(
                            "Using cached {} after fetch failure ({}), expired: {}",
                            key,
                            err,
                            cached.is_expired()
                        );
                        Ok(cached.data)
                    }
                    _ => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }
}

impl Catalog for CatalogClient {
    async fn categories(&self) -> NimbusResult<Vec<Category>> {
        let url = self.endpoint("api/channels/categories")?;
        self.fetch_list(url, "categories", None).await
    }

    async fn channels(&self, category_id: &str, format: &str) -> NimbusResult<Vec<Channel>> {
        let mut url = self.endpoint(&format!(
            "api/channels/categories/{}",
            urlencoding::encode(category_id)
        ))?;
        url.query_pairs_mut().append_pair("format", format);
        let cache_key = format!("{}:{}", category_id, format);
        self.fetch_list(url, "channels", Some(&cache_key)).await
    }

    async fn epg(&self, channel_id: &str, date: NaiveDate) -> NimbusResult<Vec<EpgListing>> {
        let mut url = self.endpoint(&format!("api/epg/{}", encode_channel_id(channel_id)))?;
        url.query_pairs_mut()
            .append_pair("date", &date.format("%Y-%m-%d").to_string());
        let value = self.fetch_json(url).await?;
        Ok(normalize_list(value, "epg_listings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_accepts_mixed_field_types() {
        let channel: Channel = serde_json::from_value(json!({
            "num": "4",
            "name": "News 24",
            "stream_type": "live",
            "stream_id": "1001",
            "stream_icon": "http://img/news.png",
            "epg_channel_id": null,
            "category_id": 12,
            "url": "http://cdn/live/1001.m3u8"
        }))
        .unwrap();

        assert_eq!(channel.stream_id, 1001);
        assert_eq!(channel.num, Some(4));
        assert_eq!(channel.category_id, "12");
        assert_eq!(channel.epg_channel_id, None);
        assert!(channel.is_playable());
    }

    #[test]
    fn test_channel_without_url_is_partial() {
        let channel: Channel = serde_json::from_value(json!({
            "stream_id": 7,
            "name": "Docs"
        }))
        .unwrap();
        assert_eq!(channel.playback_url, "");
        assert!(!channel.is_playable());
    }

    #[test]
    fn test_favorite_snapshot_drops_url() {
        let channel: Channel = serde_json::from_value(json!({
            "stream_id": 9,
            "name": "Movies",
            "stream_icon": "http://img/m.png",
            "url": "http://cdn/9.ts"
        }))
        .unwrap();

        let record = FavoriteRecord::from(&channel);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            json!({"stream_id": 9, "name": "Movies", "stream_icon": "http://img/m.png"})
        );

        let partial = Channel::from(record);
        assert!(!partial.is_playable());
        assert_eq!(partial.category_id, FAVORITES_CATEGORY);
    }

    #[test]
    fn test_normalize_bare_and_wrapped_lists() {
        let bare: Vec<Category> = normalize_list(
            json!([{"category_id": "1", "category_name": "News"}]),
            "categories",
        );
        assert_eq!(bare.len(), 1);

        let wrapped: Vec<Category> = normalize_list(
            json!({"categories": [
                {"category_id": 2, "category_name": "Sports", "parent_id": 0},
                {"category_name": "broken"}
            ]}),
            "categories",
        );
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].category_id, "2");

        let unexpected: Vec<Category> = normalize_list(json!({"error": "nope"}), "categories");
        assert!(unexpected.is_empty());
    }

    #[test]
    fn test_epg_listing_timestamps() {
        let listings: Vec<EpgListing> = normalize_list(
            json!({"epg_listings": [
                {"id": 1, "title": "Morning", "start_timestamp": "1700000000", "stop_timestamp": 1700003600},
                {"id": "2", "title": "Bad", "start_timestamp": "soon", "stop_timestamp": null}
            ]}),
            "epg_listings",
        );
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].id.as_deref(), Some("1"));
        assert_eq!(listings[0].start_timestamp, Some(1_700_000_000));
        assert_eq!(listings[0].stop_timestamp, Some(1_700_003_600));
        assert_eq!(listings[1].start_timestamp, None);
    }

    #[test]
    fn test_channel_id_encoding_escapes_dots() {
        assert_eq!(encode_channel_id("bbc.one.uk"), "bbc%2Eone%2Euk");
        assert_eq!(encode_channel_id("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_endpoint_carries_credentials() {
        let backend = BackendConfig {
            api_base: "https://tv.example.org/".to_string(),
            ..BackendConfig::default()
        };
        let client = CatalogClient::new(
            &backend,
            Session {
                server_code: "S1".into(),
                username: "ann".into(),
                password: "p&ss".into(),
            },
        )
        .unwrap();

        let url = client.endpoint("api/channels/categories").unwrap();
        assert_eq!(url.path(), "/api/channels/categories");
        assert_eq!(
            url.query(),
            Some("server_code=S1&username=ann&password=p%26ss")
        );
        assert_eq!(client.session().scope_key(), "S1:ann");
    }

    #[test]
    fn test_session_uses_camel_case() {
        let session = Session {
            server_code: "S1".into(),
            username: "ann".into(),
            password: "pw".into(),
        };
        assert_eq!(
            serde_json::to_value(&session).unwrap(),
            json!({"serverCode": "S1", "username": "ann", "password": "pw"})
        );
    }
}
