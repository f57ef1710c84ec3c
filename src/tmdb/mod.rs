//! Metadata API access.
//!
//! [`MetadataSource`] is the seam the aggregator is written against;
//! [`TmdbClient`] is the HTTP implementation.

pub mod client;
pub mod models;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogResult;
use crate::registry::DiscoverQuery;
use crate::types::MediaKind;
use models::{Collection, CollectionRef, Details, Page, RawRecord, RawSeason};

pub use client::TmdbClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingScope {
    All,
    Movie,
    Tv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
}

/// Fixed listings the API publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Listing {
    Trending(TrendingScope, TimeWindow),
    Popular(MediaKind),
    TopRated(MediaKind),
    NowPlaying,
    Upcoming,
    AiringToday,
    OnTheAir,
}

impl Listing {
    pub fn path(&self) -> String {
        match self {
            Listing::Trending(scope, window) => {
                let scope = match scope {
                    TrendingScope::All => "all",
                    TrendingScope::Movie => "movie",
                    TrendingScope::Tv => "tv",
                };
                let window = match window {
                    TimeWindow::Day => "day",
                    TimeWindow::Week => "week",
                };
                format!("/trending/{scope}/{window}")
            }
            Listing::Popular(kind) => format!("/{kind}/popular"),
            Listing::TopRated(kind) => format!("/{kind}/top_rated"),
            Listing::NowPlaying => "/movie/now_playing".into(),
            Listing::Upcoming => "/movie/upcoming".into(),
            Listing::AiringToday => "/tv/airing_today".into(),
            Listing::OnTheAir => "/tv/on_the_air".into(),
        }
    }

    /// Kind of every result, or `None` when results carry their own `media_type`.
    pub fn kind(&self) -> Option<MediaKind> {
        match self {
            Listing::Trending(TrendingScope::All, _) => None,
            Listing::Trending(TrendingScope::Movie, _) => Some(MediaKind::Movie),
            Listing::Trending(TrendingScope::Tv, _) => Some(MediaKind::Tv),
            Listing::Popular(kind) | Listing::TopRated(kind) => Some(*kind),
            Listing::NowPlaying | Listing::Upcoming => Some(MediaKind::Movie),
            Listing::AiringToday | Listing::OnTheAir => Some(MediaKind::Tv),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Multi,
    Movie,
    Tv,
}

impl SearchScope {
    pub fn path(&self) -> &'static str {
        match self {
            SearchScope::Multi => "/search/multi",
            SearchScope::Movie => "/search/movie",
            SearchScope::Tv => "/search/tv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Similar,
    Recommendations,
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Detail record with credits and videos appended.
    async fn details(&self, kind: MediaKind, id: u64) -> CatalogResult<Details>;
    async fn discover(&self, kind: MediaKind, query: &DiscoverQuery, page: u32) -> CatalogResult<Page<RawRecord>>;
    async fn search(&self, scope: SearchScope, query: &str, page: u32) -> CatalogResult<Page<RawRecord>>;
    async fn search_collections(&self, query: &str) -> CatalogResult<Page<CollectionRef>>;
    async fn collection(&self, id: u64) -> CatalogResult<Collection>;
    async fn listing(&self, listing: Listing, page: u32) -> CatalogResult<Page<RawRecord>>;
    async fn season(&self, tv_id: u64, season: u32) -> CatalogResult<RawSeason>;
    async fn related(&self, kind: MediaKind, id: u64, relation: Relation, page: u32) -> CatalogResult<Page<RawRecord>>;
}
