//! Grouping definitions: which titles make up a franchise or network, and how to fetch them.
//!
//! Definitions are versioned TOML documents. The built-in set under
//! `registries/` is compiled in; a directory of additional or replacement
//! files can be layered on top with [`Registry::load_dir`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::types::{normalize_name, FranchiseQuery, MediaKind, SortKey};

/// Registry file format understood by this build.
pub const REGISTRY_VERSION: u32 = 1;

const BUILTIN: &[(&str, &str)] = &[
    ("marvel.toml", include_str!("../registries/marvel.toml")),
    ("star-wars.toml", include_str!("../registries/star-wars.toml")),
    ("harry-potter.toml", include_str!("../registries/harry-potter.toml")),
    ("disney.toml", include_str!("../registries/disney.toml")),
    ("pixar.toml", include_str!("../registries/pixar.toml")),
    ("dc.toml", include_str!("../registries/dc.toml")),
    ("networks.toml", include_str!("../registries/networks.toml")),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Flat,
    #[default]
    Partitioned,
}

/// Identity used when deduplicating a grouping's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityKey {
    #[default]
    IdKind,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gate {
    Animated,
    LiveAction,
}

/// Parameters of one paginated discovery listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverQuery {
    pub with_companies: Vec<u64>,
    pub with_networks: Vec<u64>,
    pub with_genres: Vec<u32>,
    pub without_genres: Vec<u32>,
    pub with_keywords: Vec<u64>,
    pub with_watch_providers: Vec<u64>,
    pub watch_region: Option<String>,
    pub with_original_language: Option<String>,
    pub sort_by: Option<String>,
    pub min_vote_count: Option<u32>,
}

fn join<T: ToString>(values: &[T], sep: &str) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(sep)
}

impl DiscoverQuery {
    pub fn genre(genre: u32) -> Self {
        Self { with_genres: vec![genre], ..Default::default() }
    }

    /// Query-string pairs; id lists are OR-ed except genres, which are AND-ed.
    pub fn params(&self, default_region: &str) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut push = |k: &str, v: String| {
            if !v.is_empty() {
                out.push((k.to_string(), v));
            }
        };
        push("with_companies", join(&self.with_companies, "|"));
        push("with_networks", join(&self.with_networks, "|"));
        push("with_genres", join(&self.with_genres, ","));
        push("without_genres", join(&self.without_genres, ","));
        push("with_keywords", join(&self.with_keywords, "|"));
        if !self.with_watch_providers.is_empty() {
            push("with_watch_providers", join(&self.with_watch_providers, "|"));
            push("watch_region", self.watch_region.clone().unwrap_or_else(|| default_region.to_string()));
        }
        if let Some(lang) = &self.with_original_language {
            push("with_original_language", lang.clone());
        }
        push("sort_by", self.sort_by.clone().unwrap_or_else(|| "popularity.desc".to_string()));
        if let Some(n) = self.min_vote_count {
            push("vote_count.gte", n.to_string());
        }
        out
    }
}

fn default_pages() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Strategy {
    /// Hand-curated detail lookups.
    FixedIds {
        #[serde(default)]
        movies: Vec<u64>,
        #[serde(default)]
        tv: Vec<u64>,
    },
    Discover {
        #[serde(default)]
        movie: Option<DiscoverQuery>,
        #[serde(default)]
        tv: Option<DiscoverQuery>,
        #[serde(default = "default_pages")]
        pages: u32,
        /// Fetch each candidate's detail record before classification.
        #[serde(default)]
        verify_details: bool,
    },
    CollectionSearch {
        terms: Vec<String>,
        /// Collections whose name mentions none of these are skipped.
        #[serde(default)]
        collection_keywords: Vec<String>,
        #[serde(default)]
        tv_titles: Vec<String>,
        #[serde(default)]
        extra_movies: Vec<u64>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub exclude_keywords: Vec<String>,
    pub brand_keywords: Vec<String>,
    pub company_ids: Vec<u64>,
    pub network_ids: Vec<u64>,
    /// Require a known company/network or a brand keyword.
    pub validate: bool,
    pub excluded_origin_countries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub id: String,
    pub title: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub gate: Option<Gate>,
    #[serde(default)]
    pub sort: Option<SortKey>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub version: u32,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub key: IdentityKey,
    pub strategy: Strategy,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

impl Grouping {
    fn validate(&self, file: &str) -> CatalogResult<()> {
        let err = |reason: String| CatalogError::Registry { file: file.to_string(), reason };
        if self.version != REGISTRY_VERSION {
            return Err(err(format!(
                "grouping `{}` has version {}, this build reads version {}",
                self.id, self.version, REGISTRY_VERSION
            )));
        }
        if normalize_name(&self.id).is_empty() {
            return Err(err("grouping id is empty".into()));
        }
        match &self.strategy {
            Strategy::FixedIds { movies, tv } if movies.is_empty() && tv.is_empty() => {
                Err(err(format!("`{}` lists no ids", self.id)))
            }
            Strategy::Discover { movie: None, tv: None, .. } => {
                Err(err(format!("`{}` has no movie or tv discovery query", self.id)))
            }
            Strategy::Discover { pages: 0, .. } => Err(err(format!("`{}` requests zero pages", self.id))),
            Strategy::CollectionSearch { terms, tv_titles, extra_movies, .. }
                if terms.is_empty() && tv_titles.is_empty() && extra_movies.is_empty() =>
            {
                Err(err(format!("`{}` has nothing to search for", self.id)))
            }
            _ => Ok(()),
        }
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        let (movies, tv) = match &self.strategy {
            Strategy::FixedIds { movies, tv } => (!movies.is_empty(), !tv.is_empty()),
            Strategy::Discover { movie, tv, .. } => (movie.is_some(), tv.is_some()),
            Strategy::CollectionSearch { terms, tv_titles, extra_movies, .. } => {
                (!terms.is_empty() || !extra_movies.is_empty(), !tv_titles.is_empty())
            }
        };
        let mut out = Vec::new();
        if movies {
            out.push(MediaKind::Movie);
        }
        if tv {
            out.push(MediaKind::Tv);
        }
        out
    }
}

/// What a registered grouping is, without fetching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingSummary {
    pub id: String,
    pub title: String,
    pub aliases: Vec<String>,
    pub layout: Layout,
    pub kinds: Vec<MediaKind>,
    pub sections: Vec<String>,
}

/// A file holds either one grouping or a `[[grouping]]` array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    Many { grouping: Vec<Grouping> },
    One(Box<Grouping>),
}

pub fn parse_file(file: &str, text: &str) -> CatalogResult<Vec<Grouping>> {
    let parsed: RegistryFile = toml::from_str(text).map_err(|e| CatalogError::Registry {
        file: file.to_string(),
        reason: e.to_string(),
    })?;
    let groupings = match parsed {
        RegistryFile::Many { grouping } => grouping,
        RegistryFile::One(g) => vec![*g],
    };
    for g in &groupings {
        g.validate(file)?;
    }
    Ok(groupings)
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    groupings: Vec<Grouping>,
    // normalized id or alias -> index into `groupings`
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The compiled-in definitions.
    pub fn builtin() -> CatalogResult<Self> {
        let mut reg = Self::empty();
        for (file, text) in BUILTIN {
            for g in parse_file(file, text)? {
                if reg.index.contains_key(&normalize_name(&g.id)) {
                    return Err(CatalogError::Registry {
                        file: file.to_string(),
                        reason: format!("duplicate grouping id `{}`", g.id),
                    });
                }
                reg.insert(g);
            }
        }
        debug!(count = reg.groupings.len(), "loaded built-in registry");
        Ok(reg)
    }

    /// Layer every `*.toml` in `dir` on top; a grouping with a known id replaces it.
    pub fn load_dir(&mut self, dir: &Path) -> CatalogResult<usize> {
        let io_err = |e: std::io::Error| CatalogError::Registry { file: dir.display().to_string(), reason: e.to_string() };
        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("toml"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let file = path.display().to_string();
            let text = fs::read_to_string(&path).map_err(|e| CatalogError::Registry { file: file.clone(), reason: e.to_string() })?;
            for g in parse_file(&file, &text)? {
                info!(grouping = %g.id, file = %file, "registry override");
                self.insert(g);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    pub fn insert(&mut self, grouping: Grouping) {
        let key = normalize_name(&grouping.id);
        let idx = match self.groupings.iter().position(|g| normalize_name(&g.id) == key) {
            Some(existing) => {
                // aliases of the replaced definition go with it
                self.index.retain(|_, v| *v != existing);
                self.groupings[existing] = grouping;
                existing
            }
            None => {
                self.groupings.push(grouping);
                self.groupings.len() - 1
            }
        };
        let g = &self.groupings[idx];
        self.index.insert(normalize_name(&g.id), idx);
        for alias in &g.aliases {
            let alias = normalize_name(alias);
            if let Some(&other) = self.index.get(&alias) {
                if other != idx {
                    warn!(alias = %alias, grouping = %g.id, "alias already taken; keeping the earlier grouping");
                    continue;
                }
            }
            self.index.insert(alias, idx);
        }
    }

    pub fn get(&self, query: &FranchiseQuery) -> Option<&Grouping> {
        self.index.get(query.key()).map(|&i| &self.groupings[i])
    }

    pub fn resolve(&self, name: &str) -> CatalogResult<&Grouping> {
        self.get(&FranchiseQuery::new(name))
            .ok_or_else(|| CatalogError::UnknownGrouping(name.to_string()))
    }

    pub fn groupings(&self) -> impl Iterator<Item = &Grouping> {
        self.groupings.iter()
    }

    pub fn summaries(&self) -> Vec<GroupingSummary> {
        self.groupings
            .iter()
            .map(|g| GroupingSummary {
                id: g.id.clone(),
                title: g.title.clone(),
                aliases: g.aliases.clone(),
                layout: g.layout,
                kinds: g.kinds(),
                sections: g.sections.iter().map(|s| s.id.clone()).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groupings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groupings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_loads() {
        let reg = Registry::builtin().unwrap();
        assert!(reg.len() >= 10);
        let marvel = reg.resolve("Marvel").unwrap();
        assert!(matches!(marvel.strategy, Strategy::FixedIds { .. }));
        assert!(matches!(reg.resolve("star wars").unwrap().strategy, Strategy::CollectionSearch { .. }));
        assert_eq!(reg.resolve("Disney+").unwrap().id, "disney-plus");
        assert_eq!(reg.resolve("HBO").unwrap().id, "max");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let reg = Registry::builtin().unwrap();
        assert!(matches!(reg.resolve("nope"), Err(CatalogError::UnknownGrouping(_))));
    }

    #[test]
    fn parses_discover_grouping() {
        let text = r#"
            version = 1
            id = "tiny"
            title = "Tiny"
            layout = "flat"

            [strategy]
            kind = "discover"
            pages = 2

            [strategy.tv]
            with_networks = [213, 1024]

            [filters]
            exclude_keywords = ["cooking"]
        "#;
        let g = parse_file("tiny.toml", text).unwrap().remove(0);
        assert_eq!(g.layout, Layout::Flat);
        assert_eq!(g.key, IdentityKey::IdKind);
        assert_eq!(g.kinds(), vec![MediaKind::Tv]);
        match &g.strategy {
            Strategy::Discover { movie, tv, pages, verify_details } => {
                assert!(movie.is_none());
                assert_eq!(*pages, 2);
                assert!(!verify_details);
                let params = tv.as_ref().unwrap().params("US");
                assert!(params.contains(&("with_networks".to_string(), "213|1024".to_string())));
                assert!(params.contains(&("sort_by".to_string(), "popularity.desc".to_string())));
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn rejects_unsupported_version() {
        let text = r#"
            version = 2
            id = "future"
            title = "Future"
            [strategy]
            kind = "fixed-ids"
            movies = [1]
        "#;
        let err = parse_file("future.toml", text).unwrap_err();
        assert!(err.to_string().contains("future.toml"));
    }

    #[test]
    fn rejects_empty_strategy() {
        let text = r#"
            version = 1
            id = "empty"
            title = "Empty"
            [strategy]
            kind = "fixed-ids"
        "#;
        assert!(parse_file("empty.toml", text).is_err());
    }

    #[test]
    fn watch_providers_carry_a_region() {
        let q = DiscoverQuery { with_watch_providers: vec![8], ..Default::default() };
        let params = q.params("GB");
        assert!(params.contains(&("watch_region".to_string(), "GB".to_string())));
    }

    #[test]
    fn directory_overrides_replace_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("marvel.toml"),
            r#"
                version = 1
                id = "marvel"
                title = "Marvel (curated)"
                aliases = ["mcu"]
                [strategy]
                kind = "fixed-ids"
                movies = [1726]
            "#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut reg = Registry::builtin().unwrap();
        let before = reg.len();
        assert_eq!(reg.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(reg.len(), before);
        let marvel = reg.resolve("mcu").unwrap();
        assert_eq!(marvel.title, "Marvel (curated)");
        assert_eq!(marvel.strategy, Strategy::FixedIds { movies: vec![1726], tv: vec![] });
    }

    #[test]
    fn malformed_override_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.toml"), "version = ").unwrap();
        let mut reg = Registry::empty();
        let err = reg.load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
