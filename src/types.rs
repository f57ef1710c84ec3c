use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Value used for ratings and years the upstream record does not carry.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" | "film" => Ok(Self::Movie),
            "tv" | "show" | "shows" | "series" => Ok(Self::Tv),
            other => Err(format!("unknown media kind `{other}` (expected movie or tv)")),
        }
    }
}

/// The normalized display record every aggregation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    pub title: String,
    pub image: String,
    pub backdrop: String,
    pub rating: String,
    pub year: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub overview: String,
}

impl ContentItem {
    pub fn identity(&self) -> (u64, MediaKind) {
        (self.id, self.kind)
    }

    pub fn rating_value(&self) -> Option<f64> {
        self.rating.parse().ok()
    }

    pub fn year_value(&self) -> Option<u16> {
        self.year.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub data: Vec<ContentItem>,
}

/// Movies and shows of one grouping, kept apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub movies: Vec<ContentItem>,
    pub tv_shows: Vec<ContentItem>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.movies.len() + self.tv_shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.tv_shows.is_empty()
    }

    /// Movies then shows, unique on `(id, kind)`.
    pub fn into_flat(self) -> Vec<ContentItem> {
        let mut seen = HashSet::new();
        self.movies
            .into_iter()
            .chain(self.tv_shows)
            .filter(|item| seen.insert(item.identity()))
            .collect()
    }
}

/// Result shape chosen by a grouping's layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", content = "data", rename_all = "lowercase")]
pub enum Shelf {
    Flat(Vec<ContentItem>),
    Partitioned(Catalog),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Rating,
    Year,
    Title,
}

/// Sort for presentation. Missing ratings and years go last; ties keep their order.
pub fn sort_items(items: &mut [ContentItem], key: SortKey) {
    fn desc_missing_last<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
    match key {
        SortKey::Rating => items.sort_by(|a, b| desc_missing_last(a.rating_value(), b.rating_value())),
        SortKey::Year => items.sort_by(|a, b| desc_missing_last(a.year_value(), b.year_value())),
        SortKey::Title => items.sort_by_key(|i| i.title.to_lowercase()),
    }
}

/// A grouping name as typed by the user, normalized for registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FranchiseQuery(String);

impl FranchiseQuery {
    pub fn new(name: &str) -> Self {
        Self(normalize_name(name))
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FranchiseQuery {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Lowercase, keep alphanumerics, collapse everything else to single dashes.
pub(crate) fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            dash = false;
        } else if c == '+' {
            out.push_str("plus");
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    pub character: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub number: u32,
    pub name: String,
    pub episode_count: Option<u32>,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDetails {
    #[serde(flatten)]
    pub item: ContentItem,
    pub genres: Vec<String>,
    pub runtime_minutes: Option<u32>,
    pub tagline: Option<String>,
    pub status: Option<String>,
    pub cast: Vec<CastMember>,
    /// YouTube key of the preferred trailer.
    pub trailer: Option<String>,
    pub seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    pub season: u32,
    pub number: u32,
    pub title: String,
    pub overview: String,
    pub still: String,
    pub air_date: Option<String>,
    pub rating: String,
    pub runtime_minutes: Option<u32>,
}
