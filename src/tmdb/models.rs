//! Raw response shapes of the metadata API.
//!
//! Every field is optional or defaulted: a record with missing or `null`
//! fields still deserializes and degrades to sentinels in the normalizer.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::MediaKind;

/// Genre id the metadata API uses for animation.
pub const ANIMATION_GENRE: u32 = 16;

fn nullable<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Numbers sometimes arrive quoted; anything unreadable becomes `None`.
fn loose<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
{
    Ok(match Value::deserialize(de)? {
        Value::String(s) => s.trim().parse().ok(),
        n @ Value::Number(_) => serde_json::from_value(n).ok(),
        _ => None,
    })
}

fn loose_id<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    Ok(loose(de)?.unwrap_or_default())
}

/// A list where one unreadable element is dropped instead of failing the response.
fn skip_malformed<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = Option::<Vec<Value>>::deserialize(de)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!(error = %e, "skipping malformed result");
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    #[serde(default)]
    pub id: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

/// A movie or show as returned by listings, searches and detail lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "loose_id")]
    pub id: u64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default, deserialize_with = "loose")]
    pub vote_average: Option<f64>,
    #[serde(default, deserialize_with = "loose")]
    pub vote_count: Option<u64>,
    #[serde(default, deserialize_with = "loose")]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub genre_ids: Vec<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<Genre>,
    #[serde(default, deserialize_with = "nullable")]
    pub origin_country: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub production_companies: Vec<Company>,
    #[serde(default, deserialize_with = "nullable")]
    pub networks: Vec<Company>,
}

impl RawRecord {
    /// Kind tag carried by mixed-kind responses (trending, multi search).
    pub fn tagged_kind(&self) -> Option<MediaKind> {
        match self.media_type.as_deref() {
            Some("movie") => Some(MediaKind::Movie),
            Some("tv") => Some(MediaKind::Tv),
            _ => None,
        }
    }

    /// Genre ids from either the listing form (`genre_ids`) or the detail form (`genres`).
    pub fn genre_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.genre_ids
            .iter()
            .copied()
            .chain(self.genres.iter().map(|g| g.id))
    }

    pub fn has_genre(&self, genre: u32) -> bool {
        self.genre_ids().any(|g| g == genre)
    }

    pub fn company_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.production_companies.iter().map(|c| c.id)
    }

    pub fn network_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.networks.iter().map(|c| c.id)
    }

    /// Lowercased title and overview, the haystack for keyword rules.
    pub fn searchable_text(&self) -> String {
        let mut text = String::new();
        for part in [
            self.title.as_deref(),
            self.name.as_deref(),
            self.overview.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            text.push_str(&part.to_lowercase());
            text.push('\n');
        }
        text
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Page<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "Vec::new", deserialize_with = "skip_malformed")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

impl<T> Page<T> {
    pub fn single(results: Vec<T>) -> Self {
        Self { page: 1, total_results: results.len() as u64, total_pages: 1, results }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRef {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "skip_malformed")]
    pub parts: Vec<RawRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCast {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default, deserialize_with = "nullable")]
    pub cast: Vec<RawCast>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVideo {
    #[serde(default, deserialize_with = "nullable")]
    pub key: String,
    #[serde(default, deserialize_with = "nullable")]
    pub site: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub video_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub official: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoList {
    #[serde(default, deserialize_with = "nullable")]
    pub results: Vec<RawVideo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSeasonSummary {
    #[serde(default)]
    pub season_number: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub episode_count: Option<u32>,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

/// Detail lookup: the base record plus the appended sub-resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Details {
    #[serde(flatten)]
    pub record: RawRecord,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub episode_run_time: Vec<u32>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub number_of_seasons: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub seasons: Vec<RawSeasonSummary>,
    #[serde(default)]
    pub credits: Option<Credits>,
    #[serde(default)]
    pub videos: Option<VideoList>,
}

impl From<RawRecord> for Details {
    fn from(record: RawRecord) -> Self {
        Self { record, ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEpisode {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub episode_number: u32,
    #[serde(default)]
    pub season_number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub still_path: Option<String>,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default, deserialize_with = "loose")]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub runtime: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSeason {
    #[serde(default)]
    pub season_number: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub episodes: Vec<RawEpisode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_arrays_degrade_to_empty() {
        let raw: RawRecord = serde_json::from_str(
            r#"{"id": 7, "name": "Show", "genre_ids": null, "origin_country": null, "poster_path": null}"#,
        )
        .unwrap();
        assert_eq!(raw.id, 7);
        assert!(raw.genre_ids.is_empty());
        assert!(raw.origin_country.is_empty());
        assert_eq!(raw.poster_path, None);
    }

    #[test]
    fn detail_genres_count_as_genre_ids() {
        let raw: RawRecord = serde_json::from_str(
            r#"{"id": 1, "genres": [{"id": 16, "name": "Animation"}]}"#,
        )
        .unwrap();
        assert!(raw.has_genre(ANIMATION_GENRE));
    }

    #[test]
    fn details_flatten_the_base_record() {
        let d: Details = serde_json::from_str(
            r#"{"id": 11, "title": "Star Wars", "runtime": 121,
                "credits": {"cast": [{"id": 2, "name": "Mark Hamill", "character": "Luke"}]},
                "videos": {"results": [{"key": "abc", "site": "YouTube", "type": "Trailer"}]}}"#,
        )
        .unwrap();
        assert_eq!(d.record.id, 11);
        assert_eq!(d.record.title.as_deref(), Some("Star Wars"));
        assert_eq!(d.runtime, Some(121));
        assert_eq!(d.credits.unwrap().cast[0].name, "Mark Hamill");
        assert_eq!(d.videos.unwrap().results[0].video_type, "Trailer");
    }

    #[test]
    fn one_bad_record_does_not_sink_the_page() {
        let page: Page<RawRecord> = serde_json::from_str(
            r#"{"page": 1, "results": [
                {"id": 1, "title": "Good", "vote_average": "7.1", "vote_count": "12"},
                {"id": null, "title": "No Id"},
                {"id": 3, "title": "Bad Genres", "genre_ids": "action"},
                {"id": 4, "title": "Odd Score", "vote_average": {"value": 8}}
            ]}"#,
        )
        .unwrap();
        let ids: Vec<u64> = page.results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 0, 4]);
        assert_eq!(page.results[0].vote_average, Some(7.1));
        assert_eq!(page.results[0].vote_count, Some(12));
        assert_eq!(page.results[2].vote_average, None);
    }
}
