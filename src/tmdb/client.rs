use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::{Collection, CollectionRef, Details, Page, RawRecord, RawSeason};
use super::{Listing, MetadataSource, Relation, SearchScope};
use crate::config::Config;
use crate::error::{CatalogError, CatalogResult};
use crate::registry::DiscoverQuery;
use crate::types::MediaKind;

/// HTTP client for the metadata API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: String,
    api_key: String,
    language: String,
    region: String,
}

impl TmdbClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        language: &str,
        region: &str,
        request_timeout: Duration,
    ) -> CatalogResult<Self> {
        if api_key.trim().is_empty() {
            return Err(CatalogError::Config("metadata API key is not set".into()));
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("marquee/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            language: language.to_string(),
            region: region.to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> CatalogResult<Self> {
        Self::new(
            &cfg.api_base_url,
            &cfg.api_key,
            &cfg.language,
            &cfg.region,
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(String, String)]) -> CatalogResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(path, "metadata request");
        let resp = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(CatalogError::Status { status: status.as_u16(), path: path.to_string() });
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| CatalogError::Decode(format!("{path}: {e}")))
    }
}

fn page_param(page: u32) -> (String, String) {
    ("page".to_string(), page.max(1).to_string())
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn details(&self, kind: MediaKind, id: u64) -> CatalogResult<Details> {
        let params = [("append_to_response".to_string(), "credits,videos".to_string())];
        self.get(&format!("/{kind}/{id}"), &params).await
    }

    async fn discover(&self, kind: MediaKind, query: &DiscoverQuery, page: u32) -> CatalogResult<Page<RawRecord>> {
        let mut params = query.params(&self.region);
        params.push(page_param(page));
        self.get(&format!("/discover/{kind}"), &params).await
    }

    async fn search(&self, scope: SearchScope, query: &str, page: u32) -> CatalogResult<Page<RawRecord>> {
        let params = [
            ("query".to_string(), query.to_string()),
            ("include_adult".to_string(), "false".to_string()),
            page_param(page),
        ];
        self.get(scope.path(), &params).await
    }

    async fn search_collections(&self, query: &str) -> CatalogResult<Page<CollectionRef>> {
        let params = [("query".to_string(), query.to_string()), page_param(1)];
        self.get("/search/collection", &params).await
    }

    async fn collection(&self, id: u64) -> CatalogResult<Collection> {
        self.get(&format!("/collection/{id}"), &[]).await
    }

    async fn listing(&self, listing: Listing, page: u32) -> CatalogResult<Page<RawRecord>> {
        let mut params = vec![page_param(page)];
        if matches!(listing, Listing::NowPlaying | Listing::Upcoming) {
            params.push(("region".to_string(), self.region.clone()));
        }
        self.get(&listing.path(), &params).await
    }

    async fn season(&self, tv_id: u64, season: u32) -> CatalogResult<RawSeason> {
        self.get(&format!("/tv/{tv_id}/season/{season}"), &[]).await
    }

    async fn related(&self, kind: MediaKind, id: u64, relation: Relation, page: u32) -> CatalogResult<Page<RawRecord>> {
        let rel = match relation {
            Relation::Similar => "similar",
            Relation::Recommendations => "recommendations",
        };
        self.get(&format!("/{kind}/{id}/{rel}"), &[page_param(page)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_a_config_error() {
        let err = TmdbClient::new("https://api.example", " ", "en-US", "US", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let c = TmdbClient::new("https://api.example/3/", "k", "en-US", "US", Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url, "https://api.example/3");
    }
}
