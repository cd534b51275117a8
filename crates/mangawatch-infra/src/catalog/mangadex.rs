//! MangaDexClient -- concrete [`CatalogClient`] for the MangaDex REST API.
//!
//! Two endpoints are used: `GET /manga/{id}` for metadata and
//! `GET /manga/{id}/feed` for chapters published since a checkpoint.

use std::time::Instant;

use chrono::{DateTime, Utc};
use mangawatch_core::catalog::CatalogClient;
use mangawatch_observe::metrics;
use mangawatch_types::config::GlobalConfig;
use mangawatch_types::error::CatalogError;
use mangawatch_types::manga::{Chapter, Manga};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{ApiFeedItem, ApiManga, ApiResponse};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Every content rating; the feed hides some of them by default.
const CONTENT_RATINGS: [&str; 4] = ["safe", "suggestive", "erotica", "pornographic"];

/// Timestamp layout accepted by `publishAtSince` (UTC, no offset).
const PUBLISH_SINCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Host of the human-facing site, accepted in manga links.
const READER_HOST: &str = "mangadex.org";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP catalog client.
pub struct MangaDexClient {
    http: reqwest::Client,
    base_url: String,
    feed_limit: u32,
}

impl MangaDexClient {
    pub fn new(base_url: impl Into<String>, feed_limit: u32) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mangawatch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into(),
            feed_limit,
        }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.catalog_base_url.clone(), config.feed_limit)
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CatalogError::RequestFailed(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CatalogError::RequestFailed("base url cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Feed url for one manga, optionally narrowed to a language and to
    /// chapters published at or after `since`.
    pub fn feed_url(
        &self,
        manga_id: &str,
        language: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Url, CatalogError> {
        let mut url = self.endpoint(&["manga", manga_id, "feed"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.feed_limit.to_string());
            for rating in CONTENT_RATINGS {
                query.append_pair("contentRating[]", rating);
            }
            query
                .append_pair("includeFutureUpdates", "1")
                .append_pair("order[publishAt]", "asc");
            if let Some(language) = language {
                query.append_pair("translatedLanguage[]", language);
            }
            if let Some(since) = since {
                query.append_pair(
                    "publishAtSince",
                    &since.format(PUBLISH_SINCE_FORMAT).to_string(),
                );
            }
        }
        Ok(url)
    }

    /// GET `url` and unwrap the envelope, timing the request under
    /// `endpoint`.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
    ) -> Result<T, CatalogError> {
        let started = Instant::now();
        let result = self.fetch_data(url).await;
        metrics::record_catalog_request(endpoint, status_label(&result), started.elapsed());
        result
    }

    async fn fetch_data<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound);
        }
        if !status.is_success() {
            return Err(CatalogError::RequestFailed(format!(
                "request failed with status {}",
                status.as_u16()
            )));
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        body.into_data()
    }
}

impl CatalogClient for MangaDexClient {
    async fn fetch_manga(&self, manga_id: &str) -> Result<Manga, CatalogError> {
        let url = self.endpoint(&["manga", manga_id])?;
        debug!(manga_id, "fetching manga");
        let manga: ApiManga = self.get("manga", url).await?;
        Ok(manga.into())
    }

    async fn fetch_new_chapters(
        &self,
        manga_id: &str,
        language: Option<&str>,
        published_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Chapter>, CatalogError> {
        let url = self.feed_url(manga_id, language, published_since)?;
        debug!(manga_id, ?language, ?published_since, "fetching feed");

        let items: Vec<ApiFeedItem> = self.get("feed", url).await?;
        Ok(items
            .into_iter()
            .filter(ApiFeedItem::is_chapter)
            .map(Chapter::from)
            .collect())
    }
}

/// `status` label of the catalog latency histogram.
fn status_label<T>(result: &Result<T, CatalogError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(CatalogError::NotFound) => "not_found",
        Err(CatalogError::RequestFailed(_)) => "failed",
        Err(CatalogError::InvalidResponse(_)) => "invalid",
    }
}

// ---------------------------------------------------------------------------
// Manga references
// ---------------------------------------------------------------------------

/// Extract a manga id from user input: either a bare id or a title link such
/// as `https://mangadex.org/title/{id}/one-punch-man`.
pub fn parse_manga_ref(input: &str) -> Option<String> {
    let input = input.trim();
    if is_uuid(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input).ok()?;
    if url.host_str() != Some(READER_HOST) {
        return None;
    }
    let mut segments = url.path_segments()?;
    if segments.next() != Some("title") {
        return None;
    }
    segments
        .next()
        .filter(|id| is_uuid(id))
        .map(str::to_string)
}

/// Lowercase hyphenated UUID (8-4-4-4-12 hex digits).
fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| {
                group.len() == len
                    && group
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            })
}
