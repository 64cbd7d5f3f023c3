// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod cache;
pub mod catalog;
pub mod config;
pub mod epg;
pub mod error;
pub mod focus;
pub mod player;
pub mod resolver;
pub mod setup;
pub mod storage;
pub mod tui;
pub mod viewport;

pub use cache::CacheManager;
pub use catalog::{Catalog, CatalogClient};
pub use config::Config;
pub use error::{NimbusError, NimbusResult};
pub use focus::FocusStore;
pub use player::MediaSession;
pub use resolver::ChannelResolver;
pub use tui::run_tui;
