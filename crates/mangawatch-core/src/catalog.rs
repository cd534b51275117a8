//! Catalog client trait definition.
//!
//! The catalog is an external, read-only source of manga metadata and
//! chapter feeds. Implementations live in mangawatch-infra.

use chrono::{DateTime, Utc};
use mangawatch_types::error::CatalogError;
use mangawatch_types::manga::{Chapter, Manga};

/// Read-only access to the content catalog.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CatalogClient: Send + Sync {
    /// Fetch manga metadata. Fails with `CatalogError::NotFound` for an
    /// unknown id.
    fn fetch_manga(
        &self,
        manga_id: &str,
    ) -> impl std::future::Future<Output = Result<Manga, CatalogError>> + Send;

    /// Fetch chapters published since `published_since`, in ascending
    /// publish order, optionally filtered to one language.
    ///
    /// Returns an empty list (not an error) when nothing new exists.
    fn fetch_new_chapters(
        &self,
        manga_id: &str,
        language: Option<&str>,
        published_since: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<Vec<Chapter>, CatalogError>> + Send;
}
