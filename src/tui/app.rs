// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::{Catalog, CatalogClient, Category, Channel};
use crate::config::Config;
use crate::epg::{self, DayOption, EpgRequest, EpgScheduler, Program};
use crate::error::{NimbusError, NimbusResult};
use crate::focus::activation::Press;
use crate::focus::back::{BackStack, HandlerId, RemoteKey};
use crate::focus::focusable::{
    CategoryRow, ChannelRow, DayButton, Direction, FavoriteToggle, Focusable, Intent,
    PreviewSurface, ProgramCard,
};
use crate::focus::{FocusKey, FocusStore, FullscreenOrigin, ListId};
use crate::player::mpv::MpvFactory;
use crate::player::{LoadOutcome, MediaSession, Presentation, StreamKind};
use crate::resolver::{ChannelResolver, Resolution};
use crate::storage::FavoritesStore;
use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone)]
pub enum Action {
    Quit,
}

/// What to do with a channel once its playback URL is known.
#[derive(Debug, Clone, PartialEq)]
pub enum AfterResolve {
    Preview,
    Fullscreen(FullscreenOrigin),
}

/// Results of background work, delivered back to the UI task.
#[derive(Debug)]
pub enum AppMessage {
    Categories(NimbusResult<Vec<Category>>),
    Channels {
        generation: u64,
        result: NimbusResult<Vec<Channel>>,
    },
    Resolved {
        generation: u64,
        resolution: Resolution,
        after: AfterResolve,
    },
    Epg {
        request: EpgRequest,
        result: NimbusResult<Vec<Program>>,
    },
    Playback {
        stream_id: u32,
        outcome: LoadOutcome,
    },
    Player(NimbusResult<()>),
}

/// What spatial navigation needs to know about the screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavLayout<'a> {
    pub categories: usize,
    pub channels: usize,
    pub days: usize,
    pub programs: usize,
    pub selected_day: u32,
    pub last_category: Option<&'a FocusKey>,
    pub last_channel: Option<&'a FocusKey>,
}

/// Key of the element reached by moving `dir` from `from`, for moves the
/// focused element does not handle itself.
pub fn neighbor(from: &FocusKey, dir: Direction, layout: &NavLayout<'_>) -> Option<FocusKey> {
    let NavLayout {
        categories,
        channels,
        days,
        programs,
        selected_day,
        last_category,
        last_channel,
    } = *layout;

    let step = |index: usize, count: usize| -> Option<usize> {
        match dir {
            Direction::Up | Direction::Left => index.checked_sub(1),
            Direction::Down | Direction::Right => (index + 1 < count).then_some(index + 1),
        }
    };

    if let Some(i) = from.index_for("category") {
        return match dir {
            Direction::Up | Direction::Down => step(i, categories).map(FocusKey::category),
            Direction::Right if channels > 0 => Some(
                last_channel
                    .cloned()
                    .unwrap_or_else(|| FocusKey::channel_item(0)),
            ),
            _ => None,
        };
    }

    if let Some(i) = from.index_for("channel-item") {
        return match dir {
            Direction::Up | Direction::Down => step(i, channels).map(FocusKey::channel_item),
            Direction::Left if categories > 0 => Some(
                last_category
                    .cloned()
                    .unwrap_or_else(|| FocusKey::category(0)),
            ),
            _ => None,
        };
    }

    if from.index_for("favorite").is_some() {
        return (dir == Direction::Right).then(FocusKey::preview);
    }

    if *from == FocusKey::preview() {
        return match dir {
            Direction::Left => last_channel.cloned(),
            Direction::Down if days > 0 => Some(FocusKey::day(selected_day)),
            _ => None,
        };
    }

    if let Some(offset) = from.index_for("day") {
        return match dir {
            Direction::Left | Direction::Right => {
                step(offset, days).map(|o| FocusKey::day(o as u32))
            }
            Direction::Up => Some(FocusKey::preview()),
            Direction::Down if programs > 0 => Some(FocusKey::program(0)),
            Direction::Down => None,
        };
    }

    if let Some(i) = from.index_for("program") {
        return match dir {
            Direction::Left | Direction::Right => step(i, programs).map(FocusKey::program),
            Direction::Up if days > 0 => Some(FocusKey::day(selected_day)),
            _ => None,
        };
    }

    None
}

/// The element a focus key refers to.
pub fn element_for(key: &FocusKey) -> Option<Box<dyn Focusable>> {
    if let Some(index) = key.index_for("category") {
        Some(Box::new(CategoryRow { index }))
    } else if let Some(index) = key.index_for("channel-item") {
        Some(Box::new(ChannelRow { index }))
    } else if let Some(index) = key.index_for("favorite") {
        Some(Box::new(FavoriteToggle { index }))
    } else if let Some(offset) = key.index_for("day") {
        Some(Box::new(DayButton {
            offset: offset as u32,
        }))
    } else if let Some(index) = key.index_for("program") {
        Some(Box::new(ProgramCard { index }))
    } else if *key == FocusKey::preview() {
        Some(Box::new(PreviewSurface))
    } else {
        None
    }
}

pub struct App {
    pub config: Config,
    catalog: Arc<CatalogClient>,
    resolver: ChannelResolver<CatalogClient>,
    pub player: MediaSession<MpvFactory>,
    pub focus: FocusStore,
    back_stack: BackStack<FocusStore>,
    fullscreen_handler: Option<HandlerId>,
    pub epg: EpgScheduler<CatalogClient>,
    favorites: FavoritesStore,
    scope: String,
    pub account: String,
    pub categories: Vec<Category>,
    pub channels: Vec<Channel>,
    pub current_category: Option<usize>,
    pub days: Vec<DayOption>,
    pub selected_day: u32,
    pub logs: Vec<(DateTime<Local>, String)>,
    pub status_message: Option<String>,
    pub loading: Option<String>,
    pub show_help: bool,
    channel_generation: u64,
    resolve_generation: u64,
    last_epg_refresh: Instant,
    tx: mpsc::UnboundedSender<AppMessage>,
    rx: mpsc::UnboundedReceiver<AppMessage>,
}

impl App {
    pub fn new(
        config: Config,
        catalog: CatalogClient,
        player: MediaSession<MpvFactory>,
        favorites: FavoritesStore,
    ) -> Self {
        let session = catalog.session().clone();
        let catalog = Arc::new(catalog);
        let (tx, rx) = mpsc::unbounded_channel();
        let today = epg::local_today(Utc::now());

        Self {
            focus: FocusStore::new(config.player.double_press_window()),
            days: epg::day_options(today, config.ui.epg_days),
            config,
            resolver: ChannelResolver::new(Arc::clone(&catalog)),
            epg: EpgScheduler::new(Arc::clone(&catalog)),
            catalog,
            player,
            back_stack: BackStack::new(),
            fullscreen_handler: None,
            favorites,
            scope: session.scope_key(),
            account: format!("{}@{}", session.username, session.server_code),
            categories: Vec::new(),
            channels: Vec::new(),
            current_category: None,
            selected_day: 0,
            logs: Vec::new(),
            status_message: None,
            loading: None,
            show_help: false,
            channel_generation: 0,
            resolve_generation: 0,
            last_epg_refresh: Instant::now(),
            tx,
            rx,
        }
    }

    pub fn add_log(&mut self, message: String) {
        debug!("{}", message);
        self.logs.push((Local::now(), message));
        if self.logs.len() > MAX_LOGS {
            let excess = self.logs.len() - MAX_LOGS;
            self.logs.drain(..excess);
        }
    }

    fn report(&mut self, err: &NimbusError) {
        self.status_message = Some(err.banner());
        self.add_log(format!("{}", err));
    }

    pub async fn next_message(&mut self) -> Option<AppMessage> {
        self.rx.recv().await
    }

    pub fn start(&mut self) {
        self.load_categories();
    }

    fn load_categories(&mut self) {
        self.loading = Some("Loading categories...".to_string());
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(AppMessage::Categories(catalog.categories().await));
        });
    }

    /// Periodic work driven by the event loop. Returns true when a redraw is needed.
    pub fn tick(&mut self) -> bool {
        let refresh = Duration::from_secs(self.config.ui.epg_refresh_secs.max(1));
        if self.last_epg_refresh.elapsed() < refresh {
            return false;
        }
        self.last_epg_refresh = Instant::now();
        self.epg.tick(Utc::now());

        let today = epg::local_today(Utc::now());
        if self.days.first().map(|d| d.date) != Some(today) {
            self.days = epg::day_options(today, self.config.ui.epg_days);
        }
        true
    }

    pub fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Categories(result) => {
                self.loading = None;
                match result {
                    Ok(categories) => {
                        self.categories = std::iter::once(Category::favorites())
                            .chain(categories.into_iter().filter(|c| !c.is_favorites()))
                            .collect();
                        self.add_log(format!("Loaded {} categories", self.categories.len()));
                        if self.focus.snapshot().current_focus.is_none() {
                            self.focus_element(&CategoryRow { index: 0 });
                        }
                    }
                    Err(e) => {
                        self.report(&e);
                        if e == NimbusError::SessionInvalid {
                            self.focus.reset_all();
                            self.remove_fullscreen_handler();
                            self.add_log("Run `nimbus login` to sign in again".to_string());
                        }
                    }
                }
            }
            AppMessage::Channels { generation, result } => {
                if generation != self.channel_generation {
                    debug!("Dropping stale channel list");
                    return;
                }
                self.loading = None;
                match result {
                    Ok(channels) => {
                        self.add_log(format!("Loaded {} channels", channels.len()));
                        self.channels = channels;
                    }
                    Err(e) => self.report(&e),
                }
            }
            AppMessage::Resolved {
                generation,
                resolution,
                after,
            } => {
                if generation != self.resolve_generation {
                    debug!("Dropping stale resolution");
                    return;
                }
                self.on_resolved(resolution, after);
            }
            AppMessage::Epg { request, result } => {
                if self.epg.apply(&request, result, Utc::now()) {
                    if let Some(err) = self.epg.last_error().cloned() {
                        self.report(&err);
                    }
                }
            }
            AppMessage::Playback { stream_id, outcome } => match outcome {
                LoadOutcome::Started => {
                    self.add_log(format!("Playing channel {}", stream_id));
                }
                LoadOutcome::Superseded => {
                    debug!("Load of channel {} superseded", stream_id);
                }
                LoadOutcome::Failed(e) => self.report(&e),
            },
            AppMessage::Player(result) => {
                if let Err(e) = result {
                    self.report(&e);
                }
            }
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<Action> {
        if self.show_help {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::F(1) | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return None;
        }

        let remote = RemoteKey::from_key_event(&key)?;
        self.status_message = None;

        match remote {
            RemoteKey::Quit | RemoteKey::Char('q') => return Some(Action::Quit),
            RemoteKey::Char('?') => self.show_help = true,
            RemoteKey::Char('f') => self.toggle_focused_favorite(),
            RemoteKey::Char('r') => self.retry(),
            RemoteKey::Back => self.handle_back(),
            RemoteKey::Enter => {
                let intent = self
                    .focused_element()
                    .map(|element| element.activate())
                    .unwrap_or(Intent::None);
                self.apply_intent(intent);
            }
            RemoteKey::Up | RemoteKey::Down | RemoteKey::Left | RemoteKey::Right => {
                if let Some(dir) = Direction::from_remote(remote) {
                    self.handle_direction(dir);
                }
            }
            RemoteKey::Char(_) => {}
        }
        None
    }

    /// Repeats the guide fetch if it failed, otherwise reloads the categories.
    fn retry(&mut self) {
        let selected = self.focus.snapshot().selected_channel.clone();
        match selected {
            Some(channel) if self.epg.last_error().is_some() => self.load_epg(&channel),
            _ => self.load_categories(),
        }
    }

    fn focused_element(&self) -> Option<Box<dyn Focusable>> {
        self.focus.snapshot().current_focus.as_ref().and_then(element_for)
    }

    fn focus_element(&mut self, element: &dyn Focusable) {
        element.on_gain_focus(&mut self.focus);
    }

    fn focus_key(&mut self, key: &FocusKey) {
        if let Some(element) = element_for(key) {
            self.focus_element(element.as_ref());
        }
    }

    fn handle_direction(&mut self, dir: Direction) {
        if self.focus.snapshot().is_fullscreen() {
            match dir {
                Direction::Up => self.zap(-1),
                Direction::Down => self.zap(1),
                _ => {}
            }
            return;
        }

        let Some(element) = self.focused_element() else {
            if !self.categories.is_empty() {
                self.focus_element(&CategoryRow { index: 0 });
            }
            return;
        };

        if let Some(intent) = element.handle_direction(dir) {
            self.apply_intent(intent);
            return;
        }

        let snapshot = self.focus.snapshot();
        let layout = NavLayout {
            categories: self.categories.len(),
            channels: self.channels.len(),
            days: self.days.len(),
            programs: self.epg.programs().len(),
            selected_day: self.selected_day,
            last_category: snapshot.last_focused(ListId::Categories),
            last_channel: snapshot.last_focused(ListId::Channels),
        };
        let target = neighbor(&element.focus_key(), dir, &layout);
        if let Some(target) = target {
            self.focus_key(&target);
        }
    }

    fn apply_intent(&mut self, intent: Intent) {
        match intent {
            Intent::None => {}
            Intent::OpenCategory(index) => self.open_category(index),
            Intent::PressChannel(index) => self.press_channel(index),
            Intent::ToggleFavorite(index) => self.toggle_favorite(index),
            Intent::OpenPreviewFullscreen => {
                match self.focus.snapshot().selected_channel.clone() {
                    Some(channel) => self.enter_fullscreen(channel, FullscreenOrigin::Preview),
                    None => self.add_log("No channel selected".to_string()),
                }
            }
            Intent::SelectDay(offset) => self.select_day(offset),
            Intent::Focus(key) => self.focus_key(&key),
        }
    }

    fn handle_back(&mut self) {
        if self.back_stack.dispatch(&mut self.focus) {
            if !self.focus.snapshot().is_fullscreen() {
                self.on_fullscreen_closed();
            }
            return;
        }

        let current = self.focus.snapshot().current_focus.clone();
        let snapshot = self.focus.snapshot();
        let target = match current {
            Some(key) if key.index_for("channel-item").is_some() => snapshot
                .last_focused(ListId::Categories)
                .cloned()
                .or_else(|| (!self.categories.is_empty()).then(|| FocusKey::category(0))),
            Some(key) if key.index_for("category").is_some() => None,
            Some(_) => snapshot
                .last_focused(ListId::Channels)
                .cloned()
                .or_else(|| snapshot.last_focused(ListId::Categories).cloned()),
            None => None,
        };
        if let Some(target) = target {
            self.focus_key(&target);
        }
    }

    fn open_category(&mut self, index: usize) {
        let Some(category) = self.categories.get(index).cloned() else {
            return;
        };

        self.current_category = Some(index);
        self.focus.reset_for_category_change();
        self.remove_fullscreen_handler();
        self.epg.reset();
        self.channels.clear();
        self.resolve_generation += 1;
        self.channel_generation += 1;

        tokio::spawn(self.player.unload());

        if category.is_favorites() {
            self.channels = self
                .favorites
                .channels(&self.scope)
                .iter()
                .cloned()
                .map(Channel::from)
                .collect();
            self.add_log(format!("{} favorite channels", self.channels.len()));
            return;
        }

        self.add_log(format!("Loading {}", category.category_name));
        self.loading = Some(format!("Loading {}...", category.category_name));

        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        let generation = self.channel_generation;
        let format = self.config.backend.channel_format.clone();
        tokio::spawn(async move {
            let result = catalog.channels(&category.category_id, &format).await;
            let _ = tx.send(AppMessage::Channels { generation, result });
        });
    }

    fn press_channel(&mut self, index: usize) {
        let Some(channel) = self.channels.get(index).cloned() else {
            return;
        };
        let key = FocusKey::channel_item(index);

        match self
            .focus
            .press_channel(&key, channel.stream_id, Instant::now())
        {
            Press::Preview => self.preview_channel(channel),
            Press::Confirm => {
                self.enter_fullscreen(channel, FullscreenOrigin::Item(key))
            }
        }
    }

    /// Selects `channel` and starts its muted preview, resolving it first if needed.
    fn preview_channel(&mut self, channel: Channel) {
        let changed = !self.focus.snapshot().is_selected(channel.stream_id);

        if !channel.is_playable() {
            if !self.focus.snapshot().is_fullscreen() {
                let _ = self.focus.select(channel.clone());
            }
            self.spawn_resolve(channel, AfterResolve::Preview);
            return;
        }

        if let Err(e) = self.focus.select(channel.clone()) {
            self.add_log(e.to_string());
            return;
        }
        if changed {
            self.focus.reset_for_channel_change();
        }
        self.start_playback(&channel);
        self.load_epg(&channel);
    }

    fn enter_fullscreen(&mut self, channel: Channel, origin: FullscreenOrigin) {
        if !channel.is_playable() {
            self.spawn_resolve(channel, AfterResolve::Fullscreen(origin));
            return;
        }

        let was_selected = self.focus.snapshot().is_selected(channel.stream_id);
        if let Err(e) = self.focus.open_fullscreen(channel.clone(), origin) {
            self.add_log(e.to_string());
            return;
        }

        info!("Fullscreen: {}", channel.name);
        self.fullscreen_handler = Some(
            self.back_stack
                .push(|focus: &mut FocusStore| focus.close_fullscreen().is_ok()),
        );
        self.spawn_presentation(Presentation::Fullscreen);

        if !self.player.state().is_playing(&channel.playback_url) {
            self.start_playback(&channel);
        }
        if !was_selected {
            self.focus.reset_for_channel_change();
            self.load_epg(&channel);
        }
    }

    fn on_fullscreen_closed(&mut self) {
        self.remove_fullscreen_handler();
        self.spawn_presentation(Presentation::Preview);
    }

    fn remove_fullscreen_handler(&mut self) {
        if let Some(id) = self.fullscreen_handler.take() {
            self.back_stack.remove(id);
        }
    }

    /// Switches to the neighbouring channel while fullscreen.
    fn zap(&mut self, delta: isize) {
        let Some(current) = self.focus.snapshot().selected_channel.as_ref() else {
            return;
        };
        let Some(position) = self
            .channels
            .iter()
            .position(|c| c.stream_id == current.stream_id)
        else {
            return;
        };
        let Some(next) = position
            .checked_add_signed(delta)
            .and_then(|i| self.channels.get(i))
            .cloned()
        else {
            return;
        };
        self.add_log(format!("Switching to {}", next.name));
        self.preview_channel(next);
    }

    fn on_resolved(&mut self, resolution: Resolution, after: AfterResolve) {
        let channel = match resolution {
            Resolution::Ready(channel) => channel,
            Resolution::Miss(channel) => {
                self.report(&NimbusError::ResolutionMiss(channel.stream_id));
                return;
            }
        };

        for row in self
            .channels
            .iter_mut()
            .filter(|c| c.stream_id == channel.stream_id)
        {
            *row = channel.clone();
        }

        match after {
            AfterResolve::Preview => self.preview_channel(channel),
            AfterResolve::Fullscreen(origin) => self.enter_fullscreen(channel, origin),
        }
    }

    fn spawn_resolve(&mut self, channel: Channel, after: AfterResolve) {
        self.resolve_generation += 1;
        let generation = self.resolve_generation;
        self.add_log(format!("Looking up {}", channel.name));

        let resolver = self.resolver.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let resolution = resolver.resolve(channel).await;
            let _ = tx.send(AppMessage::Resolved {
                generation,
                resolution,
                after,
            });
        });
    }

    fn start_playback(&self, channel: &Channel) {
        let load = self.player.load(&channel.playback_url, StreamKind::Live);
        let tx = self.tx.clone();
        let stream_id = channel.stream_id;
        tokio::spawn(async move {
            let outcome = load.await;
            let _ = tx.send(AppMessage::Playback { stream_id, outcome });
        });
    }

    fn spawn_presentation(&self, presentation: Presentation) {
        let player = self.player.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = player.set_presentation(presentation).await;
            let _ = tx.send(AppMessage::Player(result));
        });
    }

    fn load_epg(&mut self, channel: &Channel) {
        let Some(day) = self.days.get(self.selected_day as usize) else {
            return;
        };
        let request = self.epg.begin(&channel.stream_id.to_string(), day.date);
        let catalog = self.epg.catalog();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = EpgScheduler::fetch(catalog, &request, Utc::now()).await;
            let _ = tx.send(AppMessage::Epg { request, result });
        });
    }

    fn select_day(&mut self, offset: u32) {
        if offset as usize >= self.days.len() {
            return;
        }
        self.selected_day = offset;
        self.focus.reset_for_channel_change();
        if let Some(channel) = self.focus.snapshot().selected_channel.clone() {
            self.load_epg(&channel);
        }
    }

    fn toggle_focused_favorite(&mut self) {
        let focused = self.focus.snapshot().current_focus.clone();
        let index = focused.as_ref().and_then(|key| {
            key.index_for("channel-item")
                .or_else(|| key.index_for("favorite"))
        });
        if let Some(index) = index {
            self.toggle_favorite(index);
        }
    }

    fn toggle_favorite(&mut self, index: usize) {
        let Some(channel) = self.channels.get(index).cloned() else {
            return;
        };
        match self.favorites.toggle(&self.scope, &channel) {
            Ok(true) => self.add_log(format!("Added {} to favorites", channel.name)),
            Ok(false) => {
                self.add_log(format!("Removed {} from favorites", channel.name));
                let in_favorites = self
                    .current_category
                    .and_then(|i| self.categories.get(i))
                    .is_some_and(|c| c.is_favorites());
                if in_favorites {
                    self.channels.retain(|c| c.stream_id != channel.stream_id);
                    if self.channels.is_empty() {
                        self.focus_key(&FocusKey::category(0));
                    } else if index >= self.channels.len() {
                        self.focus_key(&FocusKey::channel_item(self.channels.len() - 1));
                    }
                }
            }
            Err(e) => {
                warn!("Failed to toggle favorite: {:#}", e);
                self.add_log(format!("Failed to update favorites: {}", e));
            }
        }
    }

    pub fn is_favorite(&self, stream_id: u32) -> bool {
        self.favorites.is_favorite(&self.scope, stream_id)
    }

    pub fn focused_index(&self, list: ListId, prefix: &str) -> usize {
        self.focus
            .snapshot()
            .last_focused(list)
            .and_then(|key| key.index_for(prefix))
            .unwrap_or(0)
    }

    pub fn is_focused(&self, key: &FocusKey) -> bool {
        self.focus.snapshot().current_focus.as_ref() == Some(key)
    }

    pub async fn shutdown(&self) {
        self.player.destroy().await;
    }
}
