//! MangaDex API response types.
//!
//! Wire structures only; they are converted into the catalog-agnostic
//! `Manga`/`Chapter` types from mangawatch-types before leaving this crate.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use mangawatch_types::error::CatalogError;
use mangawatch_types::manga::{Chapter, Manga};
use serde::Deserialize;

/// Envelope wrapping every MangaDex response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub response: String,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u32,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload. The first reported error wins; an envelope with
    /// neither errors nor data is also invalid.
    pub fn into_data(self) -> Result<T, CatalogError> {
        if let Some(err) = self.errors.first() {
            return Err(CatalogError::InvalidResponse(err.to_string()));
        }
        self.data
            .ok_or_else(|| CatalogError::InvalidResponse("response without data".to_string()))
    }
}

/// One entry of the envelope's `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "details")]
    pub detail: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - failed with status {} [{}]: {}",
            self.id,
            self.status,
            self.title,
            self.detail.as_deref().unwrap_or("")
        )
    }
}

// ---------------------------------------------------------------------------
// Manga
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApiManga {
    pub id: String,
    pub attributes: ApiMangaAttributes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMangaAttributes {
    #[serde(default)]
    pub title: BTreeMap<String, String>,
    #[serde(default)]
    pub available_translated_languages: Vec<Option<String>>,
}

impl From<ApiManga> for Manga {
    fn from(m: ApiManga) -> Self {
        Manga {
            id: m.id,
            title: m.attributes.title,
            available_languages: m
                .attributes
                .available_translated_languages
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFeedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: ApiChapterAttributes,
}

/// Chapter attributes. MangaDex sends `null` for a missing volume, number,
/// or title; those become empty strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChapterAttributes {
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub translated_language: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    pub publish_at: DateTime<Utc>,
}

impl ApiFeedItem {
    pub fn is_chapter(&self) -> bool {
        self.kind == "chapter"
    }
}

impl From<ApiFeedItem> for Chapter {
    fn from(item: ApiFeedItem) -> Self {
        let a = item.attributes;
        Chapter {
            id: item.id,
            title: a.title.unwrap_or_default(),
            volume: a.volume.unwrap_or_default(),
            chapter: a.chapter.unwrap_or_default(),
            external_url: a.external_url.filter(|u| !u.is_empty()),
            published_at: a.publish_at,
        }
    }
}
