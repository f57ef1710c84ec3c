use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CatalogError, CatalogResult, FetchFailure};
use crate::fanout::{Batch, FanOut};
use crate::mapping::{normalize, ImageSizes};
use crate::registry::{DiscoverQuery, Grouping, IdentityKey, Strategy};
use crate::rules::{GenreGate, RuleSet};
use crate::tmdb::models::RawRecord;
use crate::tmdb::{MetadataSource, SearchScope};
use crate::types::{normalize_name, sort_items, Catalog, ContentItem, MediaKind, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Partial,
}

/// Data assembled from upstream plus the requests that did not make it.
///
/// A call whose every request failed is reported as
/// [`CatalogError::Unavailable`] instead, so an `Aggregated` with empty data
/// means the upstream really had nothing.
#[derive(Debug)]
pub struct Aggregated<T> {
    pub data: T,
    pub failures: Vec<FetchFailure>,
    pub attempted: usize,
}

impl<T> Aggregated<T> {
    pub fn completeness(&self) -> Completeness {
        if self.failures.is_empty() { Completeness::Complete } else { Completeness::Partial }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Aggregated<U> {
        Aggregated { data: f(self.data), failures: self.failures, attempted: self.attempted }
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

/// Running account of the batches issued for one call.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    failures: Vec<FetchFailure>,
    attempted: usize,
}

impl Tally {
    pub(crate) fn absorb<T>(&mut self, batch: Batch<T>) -> Vec<T> {
        self.attempted += batch.attempted;
        self.failures.extend(batch.failures);
        batch.items
    }

    /// Fold in a nested call's outcome; an unavailable nested call counts as its failures.
    pub(crate) fn merge<T>(&mut self, result: CatalogResult<Aggregated<T>>) -> CatalogResult<Option<T>> {
        match result {
            Ok(agg) => {
                self.attempted += agg.attempted;
                self.failures.extend(agg.failures);
                Ok(Some(agg.data))
            }
            Err(CatalogError::Unavailable { failures }) => {
                self.attempted += failures.len();
                self.failures.extend(failures);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn finish<T>(self, data: T) -> CatalogResult<Aggregated<T>> {
        if self.attempted > 0 && self.failures.len() == self.attempted {
            return Err(CatalogError::Unavailable { failures: self.failures });
        }
        Ok(Aggregated { data, failures: self.failures, attempted: self.attempted })
    }
}

/// Keep the first item seen for each key, in input order.
pub fn dedup_by_identity<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// Merge a partition into one list under the grouping's identity key.
pub fn flatten(catalog: Catalog, key: IdentityKey) -> Vec<ContentItem> {
    match key {
        IdentityKey::IdKind => catalog.into_flat(),
        IdentityKey::Id => dedup_by_identity(catalog.movies.into_iter().chain(catalog.tv_shows), |i| i.id),
    }
}

/// Deduplicated, classified raw records of one grouping.
#[derive(Debug, Default)]
pub(crate) struct Gathered {
    pub movies: Vec<RawRecord>,
    pub tv: Vec<RawRecord>,
}

/// Runs a grouping's strategy against a metadata source.
#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn MetadataSource>,
    fan: FanOut,
    images: ImageSizes,
}

impl Aggregator {
    pub fn new(source: Arc<dyn MetadataSource>, fan: FanOut, images: ImageSizes) -> Self {
        Self { source, fan, images }
    }

    pub fn source(&self) -> &Arc<dyn MetadataSource> { &self.source }
    pub fn fan_out(&self) -> &FanOut { &self.fan }
    pub fn images(&self) -> &ImageSizes { &self.images }

    pub async fn aggregate(&self, grouping: &Grouping) -> CatalogResult<Aggregated<Catalog>> {
        Ok(self.gather(grouping).await?.map(|g| Catalog {
            movies: self.normalize_all(&g.movies, MediaKind::Movie),
            tv_shows: self.normalize_all(&g.tv, MediaKind::Tv),
        }))
    }

    pub async fn aggregate_flat(&self, grouping: &Grouping) -> CatalogResult<Aggregated<Vec<ContentItem>>> {
        let key = grouping.key;
        Ok(self.aggregate(grouping).await?.map(|c| flatten(c, key)))
    }

    /// The grouping's configured sections, each gated, sorted and capped.
    pub async fn sections(&self, grouping: &Grouping) -> CatalogResult<Aggregated<Vec<Section>>> {
        Ok(self.gather(grouping).await?.map(|g| self.build_sections(grouping, &g)))
    }

    pub(crate) fn build_sections(&self, grouping: &Grouping, gathered: &Gathered) -> Vec<Section> {
        grouping
            .sections
            .iter()
            .map(|spec| {
                let raws = match spec.kind {
                    MediaKind::Movie => &gathered.movies,
                    MediaKind::Tv => &gathered.tv,
                };
                let gate = spec.gate.map(|gate| RuleSet::new().with(GenreGate { gate })).unwrap_or_default();
                let mut data: Vec<ContentItem> = raws
                    .iter()
                    .filter(|r| gate.admits(r))
                    .map(|r| normalize(r, spec.kind, &self.images))
                    .collect();
                if let Some(sort) = spec.sort {
                    sort_items(&mut data, sort);
                }
                if let Some(limit) = spec.limit {
                    data.truncate(limit);
                }
                Section { id: spec.id.clone(), title: spec.title.clone(), data }
            })
            .collect()
    }

    fn normalize_all(&self, raws: &[RawRecord], kind: MediaKind) -> Vec<ContentItem> {
        raws.iter().map(|r| normalize(r, kind, &self.images)).collect()
    }

    pub(crate) async fn gather(&self, grouping: &Grouping) -> CatalogResult<Aggregated<Gathered>> {
        let rules = RuleSet::for_filters(&grouping.filters);
        if !rules.is_empty() {
            debug!(grouping = %grouping.id, rules = ?rules.names(), "classifying");
        }
        let mut tally = Tally::default();

        let (movies, tv) = match &grouping.strategy {
            Strategy::FixedIds { movies, tv } => self.fixed_ids(movies, tv, &mut tally).await,
            Strategy::Discover { movie, tv, pages, verify_details } => {
                self.discover(movie.as_ref(), tv.as_ref(), *pages, *verify_details, &mut tally).await
            }
            Strategy::CollectionSearch { terms, collection_keywords, tv_titles, extra_movies } => {
                self.collection_search(terms, collection_keywords, tv_titles, extra_movies, &mut tally).await
            }
        };

        let gathered = Gathered { movies: classify(movies, &rules), tv: classify(tv, &rules) };
        info!(
            grouping = %grouping.id,
            movies = gathered.movies.len(),
            tv = gathered.tv.len(),
            requests = tally.attempted,
            failed = tally.failures.len(),
            "aggregated grouping"
        );
        tally.finish(gathered)
    }

    async fn details_batch(&self, label: &str, kind: MediaKind, ids: &[u64]) -> Batch<RawRecord> {
        let source = &self.source;
        self.fan
            .run(label, ids.iter().copied(), |id| async move { source.details(kind, id).await.map(|d| d.record) })
            .await
    }

    async fn fixed_ids(&self, movies: &[u64], tv: &[u64], tally: &mut Tally) -> (Vec<RawRecord>, Vec<RawRecord>) {
        let (m, t) = futures::join!(
            self.details_batch("movie details", MediaKind::Movie, movies),
            self.details_batch("tv details", MediaKind::Tv, tv),
        );
        (tally.absorb(m), tally.absorb(t))
    }

    async fn discover_kind(
        &self,
        kind: MediaKind,
        query: Option<&DiscoverQuery>,
        pages: u32,
        verify: bool,
    ) -> (Batch<Vec<RawRecord>>, Batch<RawRecord>) {
        let Some(query) = query else {
            return (Batch::default(), Batch::default());
        };
        let source = &self.source;
        let label = format!("discover {kind}");
        let listed = self
            .fan
            .run(&label, 1..=pages, |page| async move { source.discover(kind, query, page).await.map(|p| p.results) })
            .await;
        if !verify {
            return (listed, Batch::default());
        }
        let ids: Vec<u64> = dedup_by_identity(listed.items.iter().flatten().map(|r| r.id), |id| *id);
        let verified = self.details_batch(&format!("verify {kind}"), kind, &ids).await;
        (listed, verified)
    }

    async fn discover(
        &self,
        movie: Option<&DiscoverQuery>,
        tv: Option<&DiscoverQuery>,
        pages: u32,
        verify: bool,
        tally: &mut Tally,
    ) -> (Vec<RawRecord>, Vec<RawRecord>) {
        let ((m_list, m_detail), (t_list, t_detail)) = futures::join!(
            self.discover_kind(MediaKind::Movie, movie, pages, verify),
            self.discover_kind(MediaKind::Tv, tv, pages, verify),
        );
        let mut merge = |listed: Batch<Vec<RawRecord>>, detailed: Batch<RawRecord>| {
            let listed: Vec<RawRecord> = tally.absorb(listed).into_iter().flatten().collect();
            let detailed = tally.absorb(detailed);
            // A candidate whose detail lookup failed is judged on its listing record.
            listed
                .into_iter()
                .map(|r| detailed.iter().find(|d| d.id == r.id).cloned().unwrap_or(r))
                .collect::<Vec<_>>()
        };
        let movies = merge(m_list, m_detail);
        let tv = merge(t_list, t_detail);
        (movies, tv)
    }

    async fn collection_search(
        &self,
        terms: &[String],
        collection_keywords: &[String],
        tv_titles: &[String],
        extra_movies: &[u64],
        tally: &mut Tally,
    ) -> (Vec<RawRecord>, Vec<RawRecord>) {
        let source = &self.source;
        let keywords: Vec<String> = collection_keywords.iter().map(|k| k.to_lowercase()).collect();

        let collections = async {
            let found = self
                .fan
                .run("collection search", terms.iter(), |term| async move { source.search_collections(term).await })
                .await;
            let ids = dedup_by_identity(
                found
                    .items
                    .iter()
                    .flat_map(|page| page.results.iter())
                    .filter(|c| c.id != 0)
                    .filter(|c| keywords.is_empty() || keywords.iter().any(|k| c.name.to_lowercase().contains(k.as_str())))
                    .map(|c| c.id),
                |id| *id,
            );
            let members = self
                .fan
                .run("collection", ids, |id| async move { source.collection(id).await.map(|c| c.parts) })
                .await;
            (found, members)
        };
        let shows = self.fan.run("tv search", tv_titles.iter(), |title| async move {
            let page = source.search(SearchScope::Tv, title, 1).await?;
            Ok(best_title_match(title, page.results))
        });
        let extras = self.details_batch("movie details", MediaKind::Movie, extra_movies);

        let ((found, members), shows, extras) = futures::join!(collections, shows, extras);
        tally.absorb(found);
        let mut movies: Vec<RawRecord> = tally.absorb(members).into_iter().flatten().collect();
        movies.extend(tally.absorb(extras));
        let tv: Vec<RawRecord> = tally.absorb(shows).into_iter().flatten().collect();
        (movies, tv)
    }
}

/// Exact (normalized) title match if there is one, else the top result.
fn best_title_match(title: &str, results: Vec<RawRecord>) -> Option<RawRecord> {
    let wanted = normalize_name(title);
    let exact = results.iter().position(|r| {
        [r.name.as_deref(), r.original_name.as_deref(), r.title.as_deref()]
            .into_iter()
            .flatten()
            .any(|n| normalize_name(n) == wanted)
    });
    let idx = exact.unwrap_or(0);
    results.into_iter().nth(idx)
}

/// Drop records without an id, deduplicate by id, then apply the grouping's rules.
fn classify(records: Vec<RawRecord>, rules: &RuleSet) -> Vec<RawRecord> {
    dedup_by_identity(records.into_iter().filter(|r| r.id != 0), |r| r.id)
        .into_iter()
        .filter(|r| rules.admits(r))
        .collect()
}
