//! Raw metadata records -> display records.
//!
//! Nothing here fails: absent or malformed upstream fields become sentinels.

use serde::{Deserialize, Serialize};

use crate::dao::LibraryEntryInsert;
use crate::tmdb::models::{Details, RawEpisode, RawRecord};
use crate::types::{CastMember, ContentDetails, ContentItem, Episode, MediaKind, SeasonSummary, NOT_AVAILABLE};

pub const POSTER_PLACEHOLDER: &str = "https://via.placeholder.com/500x750?text=No+Image";
pub const BACKDROP_PLACEHOLDER: &str = "https://via.placeholder.com/1280x720?text=No+Image";

const MAX_CAST: usize = 15;

/// Image host and the size tokens used for each artwork slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSizes {
    pub base_url: String,
    pub poster: String,
    pub backdrop: String,
    pub still: String,
    pub profile: String,
}

impl Default for ImageSizes {
    fn default() -> Self {
        Self {
            base_url: "https://image.tmdb.org/t/p".into(),
            poster: "w500".into(),
            backdrop: "w1280".into(),
            still: "w300".into(),
            profile: "w185".into(),
        }
    }
}

impl ImageSizes {
    /// `None` for absent, empty, or literal "null" paths.
    pub fn url(&self, size: &str, path: Option<&str>) -> Option<String> {
        let path = path.map(str::trim).filter(|p| !p.is_empty() && *p != "null")?;
        let sep = if path.starts_with('/') { "" } else { "/" };
        Some(format!("{}/{}{}{}", self.base_url.trim_end_matches('/'), size, sep, path))
    }

    pub fn poster(&self, path: Option<&str>) -> String {
        self.url(&self.poster, path).unwrap_or_else(|| POSTER_PLACEHOLDER.to_string())
    }

    pub fn backdrop(&self, path: Option<&str>) -> String {
        self.url(&self.backdrop, path).unwrap_or_else(|| BACKDROP_PLACEHOLDER.to_string())
    }
}

pub fn format_rating(score: Option<f64>) -> String {
    match score {
        Some(s) if s.is_finite() => format!("{s:.1}"),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn extract_year(date: Option<&str>) -> String {
    date.and_then(|d| d.trim().get(..4))
        .filter(|y| y.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn display_title(raw: &RawRecord, kind: MediaKind) -> String {
    let (primary, secondary, original) = match kind {
        MediaKind::Movie => (&raw.title, &raw.name, &raw.original_title),
        MediaKind::Tv => (&raw.name, &raw.title, &raw.original_name),
    };
    [primary, secondary, original]
        .into_iter()
        .flatten()
        .find(|t| !t.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

pub fn normalize(raw: &RawRecord, kind: MediaKind, images: &ImageSizes) -> ContentItem {
    let date = match kind {
        MediaKind::Movie => raw.release_date.as_deref(),
        MediaKind::Tv => raw.first_air_date.as_deref(),
    };
    ContentItem {
        id: raw.id,
        title: display_title(raw, kind),
        image: images.poster(raw.poster_path.as_deref()),
        backdrop: images.backdrop(raw.backdrop_path.as_deref()),
        rating: format_rating(raw.vote_average),
        year: extract_year(date),
        kind,
        overview: raw.overview.clone().unwrap_or_default(),
    }
}

pub fn normalize_details(details: &Details, kind: MediaKind, images: &ImageSizes) -> ContentDetails {
    let item = normalize(&details.record, kind, images);
    let mut cast: Vec<_> = details.credits.iter().flat_map(|c| c.cast.iter()).collect();
    cast.sort_by_key(|c| c.order.unwrap_or(u32::MAX));
    let cast = cast
        .into_iter()
        .take(MAX_CAST)
        .map(|c| CastMember {
            id: c.id,
            name: c.name.clone(),
            character: c.character.clone().filter(|s| !s.is_empty()),
            image: images.url(&images.profile, c.profile_path.as_deref()),
        })
        .collect();

    // Official trailers first, then any trailer, then teasers.
    let videos: Vec<_> = details
        .videos
        .iter()
        .flat_map(|v| v.results.iter())
        .filter(|v| v.site.eq_ignore_ascii_case("youtube") && !v.key.is_empty())
        .collect();
    let trailer = videos
        .iter()
        .find(|v| v.video_type == "Trailer" && v.official == Some(true))
        .or_else(|| videos.iter().find(|v| v.video_type == "Trailer"))
        .or_else(|| videos.iter().find(|v| v.video_type == "Teaser"))
        .map(|v| v.key.clone());

    let runtime_minutes = details.runtime.filter(|r| *r > 0).or_else(|| details.episode_run_time.first().copied());

    ContentDetails {
        item,
        genres: details.record.genres.iter().map(|g| g.name.clone()).collect(),
        runtime_minutes,
        tagline: details.tagline.clone().filter(|t| !t.is_empty()),
        status: details.status.clone(),
        cast,
        trailer,
        seasons: details
            .seasons
            .iter()
            .map(|s| SeasonSummary {
                number: s.season_number,
                name: s.name.clone(),
                episode_count: s.episode_count,
                year: extract_year(s.air_date.as_deref()),
            })
            .collect(),
    }
}

pub fn normalize_episode(raw: &RawEpisode, season: u32, images: &ImageSizes) -> Episode {
    Episode {
        id: raw.id,
        season: if raw.season_number > 0 { raw.season_number } else { season },
        number: raw.episode_number,
        title: raw
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Episode {}", raw.episode_number)),
        overview: raw.overview.clone().unwrap_or_default(),
        still: images
            .url(&images.still, raw.still_path.as_deref())
            .unwrap_or_else(|| BACKDROP_PLACEHOLDER.to_string()),
        air_date: raw.air_date.clone().filter(|d| !d.is_empty()),
        rating: format_rating(raw.vote_average),
        runtime_minutes: raw.runtime,
    }
}

pub fn library_entry_from_item(profile_id: &str, item: &ContentItem) -> LibraryEntryInsert {
    LibraryEntryInsert {
        profile_id: profile_id.to_string(),
        content_id: item.id as i64,
        kind: item.kind.as_str().to_string(),
        title: item.title.clone(),
        image: Some(item.image.clone()).filter(|i| i != POSTER_PLACEHOLDER),
        backdrop: Some(item.backdrop.clone()).filter(|b| b != BACKDROP_PLACEHOLDER),
        year: Some(item.year.clone()).filter(|y| y != NOT_AVAILABLE),
    }
}
