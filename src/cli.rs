use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use marquee::tmdb::{TimeWindow, TrendingScope};
use marquee::types::MediaKind;

/// Debugging CLI over the catalog library
#[derive(Parser)]
#[command(name = "marquee")]
#[command(about = "Browse franchise and network catalogs from the command line", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Extra registry files layered over the built-in groupings
    #[arg(long, global = true)]
    pub registry_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate one franchise or network
    Franchise {
        name: String,
        /// One merged list instead of movies / tvShows
        #[arg(long, conflicts_with = "sections")]
        flat: bool,
        /// The grouping's configured sections
        #[arg(long)]
        sections: bool,
    },
    /// List registered groupings
    Groupings,
    /// Trending titles
    Trending {
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
        #[arg(long, value_enum, default_value_t = Window::Week)]
        window: Window,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Home screen rows, optionally followed by a grouping's sections
    Home {
        #[arg(long)]
        grouping: Option<String>,
    },
    /// Search movies and shows
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Details of one title
    Details { kind: MediaKind, id: u64 },
    /// Episodes of one season
    Season { id: u64, season: u32 },
    /// Print the playback URL of a movie, or of an episode when season and episode are given
    Play {
        id: u64,
        #[arg(long, requires = "episode")]
        season: Option<u32>,
        #[arg(long, requires = "season")]
        episode: Option<u32>,
    },
    /// Profiles and watchlists in the local library
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },
}

#[derive(Subcommand)]
pub enum WatchlistAction {
    /// List profiles
    Profiles,
    /// Create a profile
    NewProfile { name: String },
    /// Show a profile's watchlist
    Show { profile: String },
    /// Save a title to a profile's watchlist
    Add { profile: String, kind: MediaKind, id: u64 },
    /// Remove a title from a profile's watchlist
    Remove { profile: String, kind: MediaKind, id: u64 },
    /// Unfinished titles for a profile
    Continue {
        profile: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Scope {
    All,
    Movie,
    Tv,
}

impl From<Scope> for TrendingScope {
    fn from(s: Scope) -> Self {
        match s {
            Scope::All => TrendingScope::All,
            Scope::Movie => TrendingScope::Movie,
            Scope::Tv => TrendingScope::Tv,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Window {
    Day,
    Week,
}

impl From<Window> for TimeWindow {
    fn from(w: Window) -> Self {
        match w {
            Window::Day => TimeWindow::Day,
            Window::Week => TimeWindow::Week,
        }
    }
}
