use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ContentItem, MediaKind};

/// Share of the duration after which a title counts as watched.
pub const FINISHED_FRACTION: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// A saved title with the display fields captured when it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub title: String,
    pub image: Option<String>,
    pub backdrop: Option<String>,
    pub year: Option<String>,
    /// Epoch milliseconds.
    pub added_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchProgress {
    #[serde(flatten)]
    pub entry: LibraryEntry,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub position_secs: f64,
    pub duration_secs: f64,
}

impl WatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.duration_secs > 0.0 { (self.position_secs / self.duration_secs).clamp(0.0, 1.0) } else { 0.0 }
    }
}

/// Where playback stopped, as reported by the embedding app.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub position_secs: f64,
    pub duration_secs: f64,
}

/// Per-profile watchlist and watch history.
#[async_trait]
pub trait Library: Send + Sync {
    async fn create_profile(&self, name: &str) -> Result<Profile>;
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// Saving a title twice keeps one entry.
    async fn add_to_watchlist(&self, profile_id: &str, item: &ContentItem) -> Result<()>;
    /// Returns whether an entry was removed.
    async fn remove_from_watchlist(&self, profile_id: &str, id: u64, kind: MediaKind) -> Result<bool>;
    async fn watchlist(&self, profile_id: &str) -> Result<Vec<LibraryEntry>>;
    async fn in_watchlist(&self, profile_id: &str, id: u64, kind: MediaKind) -> Result<bool>;

    async fn record_progress(&self, profile_id: &str, item: &ContentItem, progress: Progress) -> Result<()>;
    /// Unfinished titles, most recently watched first.
    async fn continue_watching(&self, profile_id: &str, limit: usize) -> Result<Vec<WatchProgress>>;
    async fn clear_history(&self, profile_id: &str) -> Result<u64>;
}
