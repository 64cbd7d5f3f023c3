// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod app;
pub mod event;
pub mod ui;
pub mod widgets;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::Duration;
use tracing::{debug, error};

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::player::mpv::MpvFactory;
use crate::player::{MediaSession, Surface};
use crate::storage::FavoritesStore;

pub use app::App;
pub use event::{Event, EventHandler};

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    pub event_handler: EventHandler,
}

impl Tui {
    pub fn new(tick_rate: Duration) -> Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        let event_handler = EventHandler::new(tick_rate);
        Ok(Self {
            terminal,
            event_handler,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    pub fn draw(&mut self, app: &App) -> Result<()> {
        self.terminal.draw(|frame| ui::draw(frame, app))?;
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

pub async fn run_tui(
    config: Config,
    catalog: CatalogClient,
    favorites: FavoritesStore,
) -> Result<()> {
    let factory = MpvFactory::new(&config.player);
    if !factory.is_available() {
        anyhow::bail!(
            "{} not found. Install mpv or set [player] command in the config.",
            config.player.command
        );
    }
    let player = MediaSession::new(factory, Surface::new("preview"));

    let mut tui = Tui::new(Duration::from_millis(config.ui.tick_rate_ms.max(50)))?;
    tui.init()?;

    let mut app = App::new(config, catalog, player, favorites);
    app.start();
    let res = run_app(&mut tui, &mut app).await;

    app.shutdown().await;
    tui.exit()?;

    if let Err(err) = &res {
        error!("TUI error: {:#}", err);
    }
    res
}

async fn run_app(tui: &mut Tui, app: &mut App) -> Result<()> {
    let mut playback = app.player.subscribe();
    tui.draw(app)?;

    loop {
        let should_redraw = tokio::select! {
            event = tui.event_handler.next() => match event? {
                Event::Key(key_event) => match app.handle_key_event(key_event) {
                    Some(app::Action::Quit) => break,
                    None => true,
                },
                Event::Resize(_, _) => true,
                Event::Tick => app.tick(),
            },
            Some(message) = app.next_message() => {
                app.handle_message(message);
                true
            }
            changed = playback.changed() => {
                if changed.is_err() {
                    debug!("Playback state channel closed");
                }
                changed.is_ok()
            }
        };

        if should_redraw {
            tui.draw(app)?;
        }
    }

    Ok(())
}
