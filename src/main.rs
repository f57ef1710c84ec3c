mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, WatchlistAction};
use marquee::aggregator::{Aggregated, Completeness};
use marquee::config::Config;
use marquee::db::Database;
use marquee::playback::{playback_url, PlaybackTarget};
use marquee::storage::Library;
use marquee::{load_registry, Marquee};

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_aggregated<T: Serialize>(result: Aggregated<T>) -> Result<()> {
    if result.completeness() == Completeness::Partial {
        warn!(failed = result.failures.len(), attempted = result.attempted, "partial result");
    }
    print(&result.data)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("marquee=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.registry_dir {
        config.registry_dir = Some(dir);
    }

    match cli.command {
        Commands::Groupings => print(&load_registry(&config)?.summaries())?,
        Commands::Play { id, season, episode } => {
            let target = match (season, episode) {
                (Some(season), Some(episode)) => PlaybackTarget::Episode { id, season, episode },
                _ => PlaybackTarget::Movie { id },
            };
            println!("{}", playback_url(config.playback_base_url.as_deref(), target)?);
        }
        Commands::Franchise { name, flat, sections } => {
            let marquee = Marquee::new(config)?;
            if sections {
                print_aggregated(marquee.franchise_sections(&name).await?)?;
            } else if flat {
                print_aggregated(marquee.franchise_flat(&name).await?)?;
            } else {
                print_aggregated(marquee.browse(&name).await?)?;
            }
        }
        Commands::Trending { scope, window, page } => {
            let marquee = Marquee::new(config)?;
            print(&marquee.trending(scope.into(), window.into(), page).await?)?;
        }
        Commands::Home { grouping } => {
            let marquee = Marquee::new(config)?;
            print_aggregated(marquee.home(grouping.as_deref()).await?)?;
        }
        Commands::Search { query, page } => {
            let marquee = Marquee::new(config)?;
            print(&marquee.search(&query, page).await?)?;
        }
        Commands::Details { kind, id } => {
            let marquee = Marquee::new(config)?;
            print(&marquee.details(kind, id).await?)?;
        }
        Commands::Season { id, season } => {
            let marquee = Marquee::new(config)?;
            print(&marquee.season(id, season).await?)?;
        }
        Commands::Watchlist { action } => watchlist(config, action).await?,
    }
    Ok(())
}

async fn watchlist(config: Config, action: WatchlistAction) -> Result<()> {
    let library = Database::connect(config.database_url.as_deref()).await.context("opening library")?;
    library.run_migrations().await?;

    match action {
        WatchlistAction::Profiles => print(&library.list_profiles().await?)?,
        WatchlistAction::NewProfile { name } => print(&library.create_profile(&name).await?)?,
        WatchlistAction::Show { profile } => print(&library.watchlist(&profile).await?)?,
        WatchlistAction::Add { profile, kind, id } => {
            let marquee = Marquee::new(config)?;
            let details = marquee.details(kind, id).await?;
            library.add_to_watchlist(&profile, &details.item).await?;
            print(&details.item)?;
        }
        WatchlistAction::Remove { profile, kind, id } => {
            let removed = library.remove_from_watchlist(&profile, id, kind).await?;
            print(&serde_json::json!({ "removed": removed }))?;
        }
        WatchlistAction::Continue { profile, limit } => print(&library.continue_watching(&profile, limit).await?)?,
    }
    Ok(())
}
