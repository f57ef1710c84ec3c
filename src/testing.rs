//! In-memory metadata source for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{CatalogError, CatalogResult};
use crate::registry::DiscoverQuery;
use crate::tmdb::models::{Collection, CollectionRef, Details, Page, RawRecord, RawSeason};
use crate::tmdb::{Listing, MetadataSource, Relation, SearchScope};
use crate::types::MediaKind;

/// Unknown keys answer `NotFound`; keys in `broken` answer a transport error.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub details: HashMap<(MediaKind, u64), Details>,
    pub broken: HashSet<String>,
    pub discover: HashMap<(MediaKind, u32), Vec<RawRecord>>,
    pub collection_search: HashMap<String, Vec<CollectionRef>>,
    pub collections: HashMap<u64, Collection>,
    pub searches: HashMap<(SearchScope, String), Vec<RawRecord>>,
    pub listings: HashMap<Listing, Vec<RawRecord>>,
    pub seasons: HashMap<(u64, u32), RawSeason>,
    pub related: HashMap<(MediaKind, u64, Relation), Vec<RawRecord>>,
    pub calls: AtomicUsize,
}

pub(crate) fn movie(id: u64, title: &str) -> RawRecord {
    RawRecord {
        id,
        media_type: Some("movie".into()),
        title: Some(title.into()),
        release_date: Some("2010-01-01".into()),
        vote_average: Some(7.0),
        poster_path: Some(format!("/m{id}.jpg")),
        ..Default::default()
    }
}

pub(crate) fn show(id: u64, name: &str) -> RawRecord {
    RawRecord {
        id,
        media_type: Some("tv".into()),
        name: Some(name.into()),
        first_air_date: Some("2019-01-01".into()),
        vote_average: Some(8.0),
        ..Default::default()
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_details(mut self, kind: MediaKind, record: RawRecord) -> Self {
        self.details.insert((kind, record.id), record.into());
        self
    }

    pub fn break_key(mut self, key: impl Into<String>) -> Self {
        self.broken.insert(key.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, key: String) -> CatalogResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(&key) {
            return Err(CatalogError::Transport(format!("connection reset: {key}")));
        }
        Ok(key)
    }
}

fn found<T: Clone>(value: Option<&T>, key: String) -> CatalogResult<T> {
    value.cloned().ok_or(CatalogError::NotFound(key))
}

#[async_trait]
impl MetadataSource for FakeSource {
    async fn details(&self, kind: MediaKind, id: u64) -> CatalogResult<Details> {
        let key = self.enter(format!("details/{kind}/{id}"))?;
        found(self.details.get(&(kind, id)), key)
    }

    async fn discover(&self, kind: MediaKind, _query: &DiscoverQuery, page: u32) -> CatalogResult<Page<RawRecord>> {
        self.enter(format!("discover/{kind}/{page}"))?;
        Ok(Page::single(self.discover.get(&(kind, page)).cloned().unwrap_or_default()))
    }

    async fn search(&self, scope: SearchScope, query: &str, _page: u32) -> CatalogResult<Page<RawRecord>> {
        self.enter(format!("search/{scope:?}/{query}"))?;
        Ok(Page::single(self.searches.get(&(scope, query.to_string())).cloned().unwrap_or_default()))
    }

    async fn search_collections(&self, query: &str) -> CatalogResult<Page<CollectionRef>> {
        self.enter(format!("search-collection/{query}"))?;
        Ok(Page::single(self.collection_search.get(query).cloned().unwrap_or_default()))
    }

    async fn collection(&self, id: u64) -> CatalogResult<Collection> {
        let key = self.enter(format!("collection/{id}"))?;
        found(self.collections.get(&id), key)
    }

    async fn listing(&self, listing: Listing, _page: u32) -> CatalogResult<Page<RawRecord>> {
        let key = self.enter(listing.path())?;
        found(self.listings.get(&listing), key).map(Page::single)
    }

    async fn season(&self, tv_id: u64, season: u32) -> CatalogResult<RawSeason> {
        let key = self.enter(format!("season/{tv_id}/{season}"))?;
        found(self.seasons.get(&(tv_id, season)), key)
    }

    async fn related(&self, kind: MediaKind, id: u64, relation: Relation, _page: u32) -> CatalogResult<Page<RawRecord>> {
        let key = self.enter(format!("related/{kind}/{id}/{relation:?}"))?;
        found(self.related.get(&(kind, id, relation)), key).map(Page::single)
    }
}
