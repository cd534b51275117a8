//! Subscription domain types: recipients, languages, subscriptions, topics,
//! and the update records produced by a polling pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt;
use std::str::FromStr;

use crate::manga::Chapter;

/// Wire form of the wildcard language.
pub const ANY_LANGUAGE: &str = "any";

/// Opaque, stable identifier of a message destination.
///
/// Chat platforms usually hand out numeric ids; the engine never interprets
/// the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipient(pub String);

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for Recipient {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for Recipient {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Language a subscription is bound to.
///
/// `Any` is the wildcard: notify for chapters in every language. It
/// serializes as the string `"any"`. Concrete codes are kept lower-case,
/// the form the catalog uses (`en`, `pt-br`), so `EN` and `en` name the
/// same topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Any,
    Code(String),
}

impl Language {
    pub fn code(code: impl Into<String>) -> Self {
        let code = code.into().to_ascii_lowercase();
        if code == ANY_LANGUAGE {
            Language::Any
        } else {
            Language::Code(code)
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Language::Any)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Language::Any => ANY_LANGUAGE,
            Language::Code(code) => code,
        }
    }

    /// Catalog language filter: `None` for the wildcard.
    pub fn filter(&self) -> Option<&str> {
        match self {
            Language::Any => None,
            Language::Code(code) => Some(code),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Any
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("language code cannot be empty".to_string());
        }
        Ok(Language::code(trimmed))
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One recipient's subscription to a manga in a language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub manga_id: String,
    /// Display title captured at subscribe time.
    pub manga_title: String,
    pub language: Language,
}

impl Subscription {
    pub fn topic_key(&self) -> TopicKey {
        TopicKey {
            manga_id: self.manga_id.clone(),
            language: self.language.clone(),
        }
    }

    pub fn matches(&self, manga_id: &str, language: &Language) -> bool {
        self.manga_id == manga_id && &self.language == language
    }
}

/// Identity of a topic: one manga in one language (or the wildcard).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicKey {
    pub manga_id: String,
    pub language: Language,
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.manga_id, self.language)
    }
}

/// A topic with its shared checkpoint and full subscriber set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub key: TopicKey,
    pub manga_title: String,
    /// Chapters published before this instant are not news. Starts at the
    /// topic's creation and advances with every poll.
    pub checked_at: DateTime<Utc>,
    pub recipients: Vec<Recipient>,
}

/// New chapters detected for one topic, addressed to all its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub manga_id: String,
    pub manga_title: String,
    pub language: Language,
    /// Feed order (ascending publish time).
    pub new_chapters: Vec<Chapter>,
    pub recipients: Vec<Recipient>,
}
