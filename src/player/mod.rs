// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Media session: one engine per playback surface with last-caller-wins loads.
//!
//! Every `load` and `unload` takes a new token. Work that finishes for an older
//! token is dropped, and it only undoes engine state it put there itself.

pub mod engine;
pub mod mpv;

pub use engine::{
    Engine, EngineEvent, EngineFactory, Presentation, SeekRange, StreamKind, StreamProfile,
    Surface, live_edge,
};

use crate::error::{NimbusError, NimbusResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub load_token: u64,
    pub url: Option<String>,
    pub kind: Option<StreamKind>,
    pub is_loading: bool,
    pub last_error: Option<NimbusError>,
}

impl PlaybackState {
    /// Whether `url` is loaded and has not failed.
    pub fn is_playing(&self, url: &str) -> bool {
        self.last_error.is_none() && self.url.as_deref() == Some(url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Media is loaded and playing
    Started,
    /// A later `load` or `unload` took over
    Superseded,
    /// `EngineInit` or `StreamUnavailable`; also recorded in the state
    Failed(NimbusError),
}

struct ReloadRequest {
    /// Token of the load that failed
    token: u64,
    url: String,
    kind: StreamKind,
}

struct Inner<F: EngineFactory> {
    factory: F,
    surface: Surface,
    token: AtomicU64,
    /// Highest token whose media was handed to the engine
    last_dispatched: AtomicU64,
    destroyed: AtomicBool,
    engine: Mutex<Option<Arc<F::Engine>>>,
    presentation: Mutex<Presentation>,
    state: watch::Sender<PlaybackState>,
    reload_tx: mpsc::UnboundedSender<ReloadRequest>,
}

impl<F: EngineFactory> Inner<F> {
    fn is_current(&self, token: u64) -> bool {
        self.token.load(Ordering::SeqCst) == token
    }

    /// Takes a new token and resets the state under the same lock.
    fn begin(&self, reset: impl FnOnce(&mut PlaybackState)) -> u64 {
        let mut token = 0;
        self.state.send_modify(|state| {
            token = self.token.fetch_add(1, Ordering::SeqCst) + 1;
            state.load_token = token;
            reset(state);
        });
        token
    }

    fn begin_load(&self, url: &str, kind: StreamKind) -> u64 {
        self.begin(|state| {
            state.url = Some(url.to_string());
            state.kind = Some(kind);
            state.is_loading = true;
            state.last_error = None;
        })
    }

    /// Takes the token after `failed` for a reload, unless something newer
    /// already took over.
    fn begin_reload(&self, failed: u64, url: &str, kind: StreamKind) -> Option<u64> {
        let mut token = None;
        self.state.send_if_modified(|state| {
            if self
                .token
                .compare_exchange(failed, failed + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return false;
            }
            state.load_token = failed + 1;
            state.url = Some(url.to_string());
            state.kind = Some(kind);
            state.is_loading = true;
            state.last_error = None;
            token = Some(failed + 1);
            true
        });
        token
    }

    /// Applies `update` only while `token` is current.
    fn update_if_current(&self, token: u64, update: impl FnOnce(&mut PlaybackState)) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.is_current(token) {
                update(state);
                applied = true;
            }
            applied
        });
        applied
    }

    fn current_engine(&self) -> Option<Arc<F::Engine>> {
        lock(&self.engine).clone()
    }

    fn presentation(&self) -> Presentation {
        *lock(&self.presentation)
    }

    /// Returns the bound engine, attaching one on first use.
    async fn engine(&self) -> NimbusResult<Arc<F::Engine>> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(NimbusError::EngineInit("surface destroyed".to_string()));
        }
        if let Some(engine) = self.current_engine() {
            return Ok(engine);
        }

        debug!("Attaching engine to surface {}", self.surface.name);
        let engine = self
            .factory
            .attach(&self.surface)
            .await
            .map_err(|e| match e {
                NimbusError::EngineInit(_) => e,
                other => NimbusError::EngineInit(other.to_string()),
            })?;
        let engine = Arc::new(engine);

        if let Err(e) = engine.set_presentation(self.presentation()).await {
            warn!("Failed to apply presentation: {}", e);
        }

        let (installed, spare) = {
            let mut slot = lock(&self.engine);
            match slot.as_ref() {
                Some(existing) => (Arc::clone(existing), Some(engine)),
                None => {
                    *slot = Some(Arc::clone(&engine));
                    (engine, None)
                }
            }
        };

        if let Some(spare) = spare {
            debug!("Discarding duplicate engine for {}", self.surface.name);
            let _ = spare.destroy().await;
        }

        if self.destroyed.load(Ordering::SeqCst) {
            let _ = installed.destroy().await;
            return Err(NimbusError::EngineInit("surface destroyed".to_string()));
        }

        Ok(installed)
    }
}

/// Playback on one surface.
///
/// Cloning is cheap and clones share the engine. Must be created inside a Tokio
/// runtime.
pub struct MediaSession<F: EngineFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: EngineFactory> Clone for MediaSession<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: EngineFactory> MediaSession<F> {
    pub fn new(factory: F, surface: Surface) -> Self {
        let (state, _) = watch::channel(PlaybackState::default());
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            factory,
            surface,
            token: AtomicU64::new(0),
            last_dispatched: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            engine: Mutex::new(None),
            presentation: Mutex::new(Presentation::default()),
            state,
            reload_tx,
        });

        spawn_reload_worker(Arc::downgrade(&inner), reload_rx);

        Self { inner }
    }

    pub fn surface(&self) -> &Surface {
        &self.inner.surface
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state.subscribe()
    }

    pub fn presentation(&self) -> Presentation {
        self.inner.presentation()
    }

    /// Loads `url`, superseding any load in progress.
    ///
    /// The token is taken when this is called, so loads are ordered by call even
    /// when the returned futures are spawned.
    pub fn load(
        &self,
        url: &str,
        kind: StreamKind,
    ) -> impl Future<Output = LoadOutcome> + Send + use<F> {
        let inner = Arc::clone(&self.inner);
        let url = url.to_string();
        let token = (!url.trim().is_empty()).then(|| inner.begin_load(&url, kind));
        if let Some(token) = token {
            debug!(
                "Load #{} on {}: {:?} {}",
                token, inner.surface.name, kind, url
            );
        }

        async move {
            match token {
                Some(token) => run_load(&inner, token, &url, kind, true).await,
                None => LoadOutcome::Failed(NimbusError::StreamUnavailable(
                    "no playback URL".to_string(),
                )),
            }
        }
    }

    /// Stops playback. The engine stays attached.
    ///
    /// Like `load`, the token is taken at call time.
    pub fn unload(&self) -> impl Future<Output = ()> + Send + use<F> {
        let inner = Arc::clone(&self.inner);
        let token = inner.begin(|state| {
            state.is_loading = false;
            state.last_error = None;
            state.url = None;
            state.kind = None;
        });
        debug!("Unload #{} on {}", token, inner.surface.name);

        async move {
            if let Some(engine) = inner.current_engine() {
                if let Err(e) = engine.unload().await {
                    warn!("Failed to unload: {}", e);
                }
            }
        }
    }

    /// Tears the surface down. Later loads fail with `EngineInit`.
    pub async fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.inner.begin(|state| {
            state.is_loading = false;
            state.last_error = None;
            state.url = None;
            state.kind = None;
        });

        let engine = lock(&self.inner.engine).take();
        if let Some(engine) = engine {
            debug!("Destroying engine for {}", self.inner.surface.name);
            let _ = engine.unload().await;
            if let Err(e) = engine.destroy().await {
                warn!("Failed to destroy engine: {}", e);
            }
        }
    }

    /// Switches between muted preview and fullscreen without reloading.
    pub async fn set_presentation(&self, presentation: Presentation) -> NimbusResult<()> {
        *lock(&self.inner.presentation) = presentation;
        match self.inner.current_engine() {
            Some(engine) => engine.set_presentation(presentation).await,
            None => Ok(()),
        }
    }
}

async fn run_load<F: EngineFactory>(
    inner: &Arc<Inner<F>>,
    token: u64,
    url: &str,
    kind: StreamKind,
    allow_retry: bool,
) -> LoadOutcome {
    let engine = match inner.engine().await {
        Ok(engine) => engine,
        Err(err) => {
            warn!("Engine attach failed: {}", err);
            return if inner.update_if_current(token, |state| {
                state.is_loading = false;
                state.last_error = Some(err.clone());
            }) {
                LoadOutcome::Failed(err)
            } else {
                LoadOutcome::Superseded
            };
        }
    };

    if !inner.is_current(token) {
        return LoadOutcome::Superseded;
    }

    if let Err(e) = engine.configure(&StreamProfile::for_kind(kind)).await {
        warn!("Failed to configure engine: {}", e);
    }

    if !inner.is_current(token) {
        return LoadOutcome::Superseded;
    }

    watch_events(inner, engine.as_ref(), token, url, kind, allow_retry);
    inner.last_dispatched.fetch_max(token, Ordering::SeqCst);

    let result = engine.load(url).await;

    if !inner.is_current(token) {
        if result.is_ok() && inner.last_dispatched.load(Ordering::SeqCst) == token {
            debug!("Load #{} landed after it was superseded, unloading", token);
            if let Err(e) = engine.unload().await {
                warn!("Failed to unload stale media: {}", e);
            }
        }
        return LoadOutcome::Superseded;
    }

    if let Err(err) = result {
        let err = match err {
            NimbusError::StreamUnavailable(_) => err,
            other => NimbusError::StreamUnavailable(other.to_string()),
        };
        warn!("Load #{} failed: {}", token, err);
        return if inner.update_if_current(token, |state| {
            state.is_loading = false;
            state.last_error = Some(err.clone());
        }) {
            LoadOutcome::Failed(err)
        } else {
            LoadOutcome::Superseded
        };
    }

    if kind == StreamKind::Live && engine.is_live().await {
        if let Some(position) = engine.seek_range().await.as_ref().and_then(live_edge) {
            debug!("Seeking to live edge at {:.1}s", position);
            if let Err(e) = engine.seek(position).await {
                debug!("Live edge seek failed: {}", e);
            }
        }
    }

    if let Err(e) = engine.play().await {
        debug!("Play command failed: {}", e);
    }

    if inner.update_if_current(token, |state| {
        state.is_loading = false;
        state.last_error = None;
    }) {
        LoadOutcome::Started
    } else {
        LoadOutcome::Superseded
    }
}

/// Follows engine events for one load until it is superseded.
fn watch_events<F: EngineFactory>(
    inner: &Arc<Inner<F>>,
    engine: &F::Engine,
    token: u64,
    url: &str,
    kind: StreamKind,
    allow_retry: bool,
) {
    let mut events = engine.subscribe();
    let weak = Arc::downgrade(inner);
    let url = url.to_string();

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Missed {} engine events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(inner) = weak.upgrade() else {
                break;
            };
            if !inner.is_current(token) {
                break;
            }

            match event {
                EngineEvent::Buffering(buffering) => {
                    inner.update_if_current(token, |state| state.is_loading = buffering);
                }
                EngineEvent::Error(message) => {
                    warn!("Playback error on {}: {}", inner.surface.name, message);
                    let err = NimbusError::StreamUnavailable(message);
                    inner.update_if_current(token, |state| {
                        state.is_loading = false;
                        state.last_error = Some(err);
                    });

                    if kind == StreamKind::Live {
                        if allow_retry {
                            let _ = inner.reload_tx.send(ReloadRequest {
                                token,
                                url: url.clone(),
                                kind,
                            });
                        }
                        break;
                    }
                }
            }
        }
    });
}

/// Performs the single automatic reload of a failed live stream.
fn spawn_reload_worker<F: EngineFactory>(
    weak: Weak<Inner<F>>,
    mut rx: mpsc::UnboundedReceiver<ReloadRequest>,
) {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let Some(token) = inner.begin_reload(request.token, &request.url, request.kind)
            else {
                debug!(
                    "Dropping reload of {}, load #{} was superseded",
                    request.url, request.token
                );
                continue;
            };
            info!("Reloading {} after playback error", request.url);
            let outcome = run_load(&inner, token, &request.url, request.kind, false).await;
            debug!("Reload #{} finished: {:?}", token, outcome);
        }
    });
}
