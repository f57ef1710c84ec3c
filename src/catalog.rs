//! Browse surface: grouping catalogs plus the plain listings, search and
//! detail lookups an app builds its screens from.

use crate::aggregator::{dedup_by_identity, flatten, Aggregated, Tally};
use crate::error::CatalogResult;
use crate::mapping::{normalize, normalize_details, normalize_episode};
use crate::registry::{DiscoverQuery, Layout};
use crate::tmdb::models::RawRecord;
use crate::tmdb::{Listing, Relation, SearchScope, TimeWindow, TrendingScope};
use crate::types::{Catalog, ContentDetails, ContentItem, Episode, MediaKind, Section, Shelf};
use crate::Marquee;

/// Listings shown on the home screen, in display order.
const HOME_ROWS: [(&str, &str, Listing); 5] = [
    ("trending", "Trending Now", Listing::Trending(TrendingScope::All, TimeWindow::Week)),
    ("popular-movies", "Popular Movies", Listing::Popular(MediaKind::Movie)),
    ("popular-tv", "Popular TV Shows", Listing::Popular(MediaKind::Tv)),
    ("top-rated-movies", "Top Rated Movies", Listing::TopRated(MediaKind::Movie)),
    ("top-rated-tv", "Top Rated TV Shows", Listing::TopRated(MediaKind::Tv)),
];

impl Marquee {
    pub async fn franchise(&self, name: &str) -> CatalogResult<Aggregated<Catalog>> {
        let grouping = self.registry.resolve(name)?;
        self.aggregator.aggregate(grouping).await
    }

    pub async fn franchise_flat(&self, name: &str) -> CatalogResult<Aggregated<Vec<ContentItem>>> {
        let grouping = self.registry.resolve(name)?;
        self.aggregator.aggregate_flat(grouping).await
    }

    /// Catalog in the shape the grouping is configured for.
    pub async fn browse(&self, name: &str) -> CatalogResult<Aggregated<Shelf>> {
        let grouping = self.registry.resolve(name)?;
        let key = grouping.key;
        let layout = grouping.layout;
        Ok(self.aggregator.aggregate(grouping).await?.map(|catalog| match layout {
            Layout::Flat => Shelf::Flat(flatten(catalog, key)),
            Layout::Partitioned => Shelf::Partitioned(catalog),
        }))
    }

    pub async fn franchise_sections(&self, name: &str) -> CatalogResult<Aggregated<Vec<Section>>> {
        let grouping = self.registry.resolve(name)?;
        self.aggregator.sections(grouping).await
    }

    pub async fn trending(&self, scope: TrendingScope, window: TimeWindow, page: u32) -> CatalogResult<Vec<ContentItem>> {
        self.listing(Listing::Trending(scope, window), page).await
    }

    pub async fn listing(&self, listing: Listing, page: u32) -> CatalogResult<Vec<ContentItem>> {
        let page = self.aggregator.source().listing(listing, page).await?;
        Ok(self.normalize_results(page.results, listing.kind()))
    }

    pub async fn by_genre(&self, kind: MediaKind, genre: u32, page: u32) -> CatalogResult<Vec<ContentItem>> {
        let query = DiscoverQuery::genre(genre);
        let page = self.aggregator.source().discover(kind, &query, page).await?;
        Ok(self.normalize_results(page.results, Some(kind)))
    }

    /// Movies and shows matching `query`; people are dropped. A blank query
    /// returns nothing without a request.
    pub async fn search(&self, query: &str, page: u32) -> CatalogResult<Vec<ContentItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let page = self.aggregator.source().search(SearchScope::Multi, query, page).await?;
        Ok(self.normalize_results(page.results, None))
    }

    pub async fn details(&self, kind: MediaKind, id: u64) -> CatalogResult<ContentDetails> {
        let details = self.aggregator.source().details(kind, id).await?;
        Ok(normalize_details(&details, kind, self.aggregator.images()))
    }

    pub async fn season(&self, tv_id: u64, season: u32) -> CatalogResult<Vec<Episode>> {
        let raw = self.aggregator.source().season(tv_id, season).await?;
        let images = self.aggregator.images();
        Ok(raw.episodes.iter().map(|e| normalize_episode(e, season, images)).collect())
    }

    pub async fn related(&self, kind: MediaKind, id: u64, relation: Relation, page: u32) -> CatalogResult<Vec<ContentItem>> {
        let page = self.aggregator.source().related(kind, id, relation, page).await?;
        Ok(self.normalize_results(page.results, Some(kind)))
    }

    /// Home screen rows fetched concurrently. A row whose listing fails is
    /// left out; a named grouping appends its own sections.
    pub async fn home(&self, grouping: Option<&str>) -> CatalogResult<Aggregated<Vec<Section>>> {
        let grouping = grouping.map(|name| self.registry.resolve(name)).transpose()?;
        let source = self.aggregator.source();
        let rows = self.aggregator.fan_out().run("home", HOME_ROWS.iter(), |(id, title, listing)| async move {
            let page = source.listing(*listing, 1).await?;
            Ok(Section {
                id: id.to_string(),
                title: title.to_string(),
                data: self.normalize_results(page.results, listing.kind()),
            })
        });
        let extra = async {
            match grouping {
                Some(g) => Some(self.aggregator.sections(g).await),
                None => None,
            }
        };
        let (rows, extra) = futures::join!(rows, extra);

        let mut tally = Tally::default();
        let mut sections = tally.absorb(rows);
        if let Some(result) = extra {
            if let Some(own) = tally.merge(result)? {
                sections.extend(own);
            }
        }
        tally.finish(sections)
    }

    /// Normalize a result page. `kind` applies to every record; without it each
    /// record's own `media_type` decides and untyped records are dropped.
    fn normalize_results(&self, results: Vec<RawRecord>, kind: Option<MediaKind>) -> Vec<ContentItem> {
        let images = self.aggregator.images();
        let typed = results
            .into_iter()
            .filter(|r| r.id != 0)
            .filter_map(|r| kind.or_else(|| r.tagged_kind()).map(|k| (r, k)));
        dedup_by_identity(typed, |(r, k)| (r.id, *k))
            .into_iter()
            .map(|(r, k)| normalize(&r, k, images))
            .collect()
    }
}
