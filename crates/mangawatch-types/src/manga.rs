//! Catalog content types: manga metadata and chapter feed entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::Language;

/// Language code whose title is preferred for display.
const PREFERRED_TITLE_LANGUAGE: &str = "en";

/// Manga metadata as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Manga {
    pub id: String,
    /// Titles keyed by language code.
    pub title: BTreeMap<String, String>,
    /// Languages the manga has been translated into.
    pub available_languages: Vec<String>,
}

impl Manga {
    /// Title used when echoing subscriptions back to the user.
    ///
    /// Prefers the English title, then the first title by language code,
    /// then the manga id.
    pub fn display_title(&self) -> String {
        self.title
            .get(PREFERRED_TITLE_LANGUAGE)
            .or_else(|| self.title.values().next())
            .cloned()
            .unwrap_or_else(|| self.id.clone())
    }

    /// Whether chapters in `language` can ever appear. The wildcard is
    /// always offered.
    pub fn offers(&self, language: &Language) -> bool {
        match language.filter() {
            None => true,
            Some(code) => self
                .available_languages
                .iter()
                .any(|available| available.eq_ignore_ascii_case(code)),
        }
    }
}

/// A single chapter from the catalog feed.
///
/// `volume` and `chapter` are opaque strings: the catalog does not guarantee
/// numeric formatting ("3.5", "Extra", or empty are all valid).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub volume: String,
    pub chapter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl Chapter {
    /// The identity used for notification dedup within a topic.
    pub fn dedup_key(&self) -> (&str, &str) {
        (self.volume.as_str(), self.chapter.as_str())
    }

    /// Link a reader should follow: the external url when the chapter is
    /// hosted elsewhere, otherwise the reader page under `reader_base`.
    pub fn read_link(&self, reader_base: &str) -> String {
        match self.external_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}/chapter/{}", reader_base.trim_end_matches('/'), self.id),
        }
    }
}
