// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

#![allow(dead_code)]

use chrono::NaiveDate;
use nimbus::catalog::{Catalog, Category, Channel, EpgListing};
use nimbus::error::{NimbusError, NimbusResult};
use nimbus::player::{
    Engine, EngineEvent, EngineFactory, Presentation, SeekRange, StreamProfile, Surface,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};

pub fn channel(id: u32, name: &str, url: &str) -> Channel {
    Channel {
        stream_id: id,
        name: name.to_string(),
        icon_url: None,
        playback_url: url.to_string(),
        category_id: "1".to_string(),
        num: Some(id),
        stream_type: Some("live".to_string()),
        epg_channel_id: None,
    }
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

/// In-memory catalog.
#[derive(Default)]
pub struct FakeCatalog {
    pub categories: Vec<Category>,
    pub channels: HashMap<String, Vec<Channel>>,
    pub epg: Mutex<HashMap<(String, NaiveDate), Vec<EpgListing>>>,
    pub fail: AtomicBool,
    pub channel_calls: AtomicUsize,
    pub epg_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_channels(category_id: &str, channels: Vec<Channel>) -> Self {
        let mut catalog = Self::default();
        catalog.channels.insert(category_id.to_string(), channels);
        catalog
    }

    pub fn set_epg(&self, channel_id: &str, date: NaiveDate, listings: Vec<EpgListing>) {
        self.epg
            .lock()
            .unwrap()
            .insert((channel_id.to_string(), date), listings);
    }

    fn check(&self) -> NimbusResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(NimbusError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Catalog for FakeCatalog {
    async fn categories(&self) -> NimbusResult<Vec<Category>> {
        self.check()?;
        Ok(self.categories.clone())
    }

    async fn channels(&self, category_id: &str, _format: &str) -> NimbusResult<Vec<Channel>> {
        self.channel_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.channels.get(category_id).cloned().unwrap_or_default())
    }

    async fn epg(&self, channel_id: &str, date: NaiveDate) -> NimbusResult<Vec<EpgListing>> {
        self.epg_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .epg
            .lock()
            .unwrap()
            .get(&(channel_id.to_string(), date))
            .cloned()
            .unwrap_or_default())
    }
}

/// State shared between a test, its factory and every engine it attached.
pub struct EngineShared {
    /// Media currently in the engine; replaced as soon as `load` is called
    pub current: Mutex<Option<String>>,
    pub calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<NimbusResult<()>>>>,
    pub live: AtomicBool,
    pub seek_range: Mutex<Option<SeekRange>>,
    pub attach_error: Mutex<Option<NimbusError>>,
    pub attach_count: AtomicUsize,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineShared {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            current: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            live: AtomicBool::new(false),
            seek_range: Mutex::new(None),
            attach_error: Mutex::new(None),
            attach_count: AtomicUsize::new(0),
            events,
        })
    }

    /// Holds the next `load(url)` until the returned sender fires.
    pub fn gate(&self, url: &str) -> oneshot::Sender<NimbusResult<()>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(url.to_string(), rx);
        tx
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    pub fn current(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

pub struct FakeEngine {
    shared: Arc<EngineShared>,
}

impl Engine for FakeEngine {
    async fn configure(&self, profile: &StreamProfile) -> NimbusResult<()> {
        self.shared.record(format!("configure:{:?}", profile.kind));
        Ok(())
    }

    async fn load(&self, url: &str) -> NimbusResult<()> {
        self.shared.record(format!("load:{}", url));
        *self.shared.current.lock().unwrap() = Some(url.to_string());

        let gate = self.shared.gates.lock().unwrap().remove(url);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(NimbusError::StreamUnavailable("gate dropped".into()))),
            None => Ok(()),
        }
    }

    async fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }

    async fn seek_range(&self) -> Option<SeekRange> {
        *self.shared.seek_range.lock().unwrap()
    }

    async fn seek(&self, position: f64) -> NimbusResult<()> {
        self.shared.record(format!("seek:{:.1}", position));
        Ok(())
    }

    async fn play(&self) -> NimbusResult<()> {
        self.shared.record("play");
        Ok(())
    }

    async fn unload(&self) -> NimbusResult<()> {
        self.shared.record("unload");
        *self.shared.current.lock().unwrap() = None;
        Ok(())
    }

    async fn destroy(&self) -> NimbusResult<()> {
        self.shared.record("destroy");
        Ok(())
    }

    async fn set_presentation(&self, presentation: Presentation) -> NimbusResult<()> {
        self.shared.record(format!("presentation:{:?}", presentation));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }
}

pub struct FakeFactory {
    pub shared: Arc<EngineShared>,
}

impl EngineFactory for FakeFactory {
    type Engine = FakeEngine;

    async fn attach(&self, _surface: &Surface) -> NimbusResult<FakeEngine> {
        self.shared.attach_count.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.shared.attach_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(FakeEngine {
            shared: Arc::clone(&self.shared),
        })
    }
}
