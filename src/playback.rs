//! Playback page URLs for the embedded player.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlaybackTarget {
    Movie { id: u64 },
    Episode { id: u64, season: u32, episode: u32 },
}

impl PlaybackTarget {
    fn segments(&self) -> Vec<String> {
        match *self {
            PlaybackTarget::Movie { id } => vec!["movie".into(), id.to_string()],
            PlaybackTarget::Episode { id, season, episode } => {
                vec!["tv".into(), id.to_string(), season.to_string(), episode.to_string()]
            }
        }
    }
}

/// `{base}/movie/{id}` or `{base}/tv/{id}/{season}/{episode}`.
pub fn playback_url(base: Option<&str>, target: PlaybackTarget) -> CatalogResult<Url> {
    let base = base
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| CatalogError::Config("playback base URL is not set".into()))?;
    let mut url = Url::parse(base).map_err(|e| CatalogError::Config(format!("playback base URL `{base}`: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| CatalogError::Config(format!("playback base URL `{base}` cannot take a path")))?;
        path.pop_if_empty();
        path.extend(target.segments());
    }
    Ok(url)
}
