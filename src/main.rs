// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use chrono::NaiveDate;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::fs::File;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use nimbus::Config;
use nimbus::setup::{LoginArgs, interactive_login};

mod cli;
use cli::{ApiCommand, CacheCommand, CommandContext, FavoritesCommand, OutputFormat};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "A remote-control style IPTV client for the terminal")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (nimbus_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch interactive TUI (default if no command given)
    Tui,

    /// Sign in and store the session
    Login {
        #[arg(long)]
        server_code: Option<String>,
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Execute raw API calls
    #[command(subcommand)]
    Api(ApiSubcommand),

    /// Favorite channels of the signed-in account
    #[command(subcommand)]
    Favorites(FavoritesSubcommand),

    /// Manage cache
    #[command(subcommand)]
    Cache(CacheSubcommand),
}

#[derive(Subcommand)]
enum ApiSubcommand {
    /// Get channel categories
    Categories,
    /// Get channels of a category (all channels by default)
    Channels {
        #[arg(short, long)]
        category: Option<String>,
        /// Stream format (ts, m3u8, m3u)
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Get the program guide of a channel
    Epg {
        #[arg(short, long)]
        channel: String,
        /// Day to fetch (YYYY-MM-DD), today by default
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum FavoritesSubcommand {
    /// List favorite channels
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Check every favorite against the channel catalog
    Resolve,
}

#[derive(Subcommand)]
enum CacheSubcommand {
    /// Clear cache
    Clear {
        /// Clear the cache of every account
        #[arg(long)]
        all: bool,
    },
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug_log {
        let file = File::create("nimbus_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("nimbus=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("hyper_util=error".parse()?),
            )
            .init();
    }
    Ok(())
}

async fn run_tui(mut config: Config) -> Result<()> {
    let config_path = Config::default_path();
    let context = CommandContext::new(config.clone())?;

    let session = match context.session() {
        Ok(session) if !config.needs_setup() => session,
        _ => interactive_login(&mut config, &config_path, LoginArgs::default()).await?,
    };

    let catalog = nimbus::catalog::CatalogClient::new(&config.backend, session)?
        .with_cache(&config.cache);
    let favorites = context.favorites()?;

    nimbus::run_tui(config, catalog, favorites).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config_path = Config::default_path();
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Commands::Tui) | None => run_tui(config).await?,

        Some(Commands::Login {
            server_code,
            username,
            password,
        }) => {
            let args = LoginArgs {
                server_code,
                username,
                password,
            };
            interactive_login(&mut config, &config_path, args).await?;
        }

        Some(Commands::Logout) => {
            CommandContext::new(config)?.logout()?;
            println!("Signed out");
        }

        Some(Commands::Api(cmd)) => {
            let cmd = match cmd {
                ApiSubcommand::Categories => ApiCommand::Categories,
                ApiSubcommand::Channels { category, format } => {
                    ApiCommand::Channels { category, format }
                }
                ApiSubcommand::Epg { channel, date } => ApiCommand::Epg { channel, date },
            };
            cmd.execute(CommandContext::new(config)?).await?;
        }

        Some(Commands::Favorites(cmd)) => {
            let cmd = match cmd {
                FavoritesSubcommand::List { format } => FavoritesCommand::List {
                    format: OutputFormat::from_str(&format)?,
                },
                FavoritesSubcommand::Resolve => FavoritesCommand::Resolve,
            };
            cmd.execute(CommandContext::new(config)?).await?;
        }

        Some(Commands::Cache(CacheSubcommand::Clear { all })) => {
            CacheCommand::Clear { all }
                .execute(CommandContext::new(config)?)
                .await?;
        }
    }

    Ok(())
}
