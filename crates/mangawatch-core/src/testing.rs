//! Test doubles shared by the service and dispatcher tests.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use mangawatch_types::error::{CatalogError, RepositoryError};
use mangawatch_types::manga::{Chapter, Manga};
use mangawatch_types::subscription::{Recipient, Subscription, Topic, TopicKey};

use crate::catalog::CatalogClient;
use crate::repository::memory::InMemoryStore;
use crate::repository::subscription::SubscriptionRepository;

/// A chapter published after every checkpoint a test can produce, so the
/// scripted feed always reports it.
pub fn chapter(volume: &str, number: &str) -> Chapter {
    Chapter {
        id: format!("ch-{volume}-{number}"),
        title: format!("Chapter {number}"),
        volume: volume.to_string(),
        chapter: number.to_string(),
        external_url: None,
        published_at: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// One recorded `fetch_new_chapters` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedCall {
    pub manga_id: String,
    pub language: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Catalog returning canned manga and feeds.
///
/// The feed for a manga is returned on every call until replaced, which
/// mimics a catalog with no new data between polls. Like the real feed, it
/// leaves out chapters published before `published_since`.
#[derive(Default)]
pub struct ScriptedCatalog {
    manga: Mutex<HashMap<String, Manga>>,
    feeds: Mutex<HashMap<String, Vec<Chapter>>>,
    failing_feeds: Mutex<Vec<String>>,
    calls: Mutex<Vec<FeedCall>>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manga(self, id: &str, en_title: &str) -> Self {
        let manga = Manga {
            id: id.to_string(),
            title: [("en".to_string(), en_title.to_string())].into_iter().collect(),
            available_languages: vec!["en".to_string()],
        };
        self.manga.lock().unwrap().insert(id.to_string(), manga);
        self
    }

    pub fn set_feed(&self, manga_id: &str, chapters: Vec<Chapter>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(manga_id.to_string(), chapters);
    }

    pub fn fail_feed(&self, manga_id: &str) {
        self.failing_feeds.lock().unwrap().push(manga_id.to_string());
    }

    pub fn feed_calls(&self) -> Vec<FeedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl CatalogClient for ScriptedCatalog {
    async fn fetch_manga(&self, manga_id: &str) -> Result<Manga, CatalogError> {
        self.manga
            .lock()
            .unwrap()
            .get(manga_id)
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    async fn fetch_new_chapters(
        &self,
        manga_id: &str,
        language: Option<&str>,
        published_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Chapter>, CatalogError> {
        self.calls.lock().unwrap().push(FeedCall {
            manga_id: manga_id.to_string(),
            language: language.map(str::to_string),
            since: published_since,
        });
        if self.failing_feeds.lock().unwrap().iter().any(|m| m == manga_id) {
            return Err(CatalogError::RequestFailed("status 503".to_string()));
        }
        let feed = self
            .feeds
            .lock()
            .unwrap()
            .get(manga_id)
            .cloned()
            .unwrap_or_default();
        Ok(feed
            .into_iter()
            .filter(|c| published_since.is_none_or(|since| c.published_at >= since))
            .collect())
    }
}

/// Store operation that `FlakyStore` can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Create,
    Delete,
    DeleteAll,
    Topics,
    IsNotified,
    RecordCheck,
}

/// `InMemoryStore` wrapper that fails one chosen operation.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    failing: Mutex<Option<StoreOp>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, op: StoreOp) {
        *self.failing.lock().unwrap() = Some(op);
    }

    fn check(&self, op: StoreOp) -> Result<(), RepositoryError> {
        if *self.failing.lock().unwrap() == Some(op) {
            Err(RepositoryError::Query(format!("{op:?} failed")))
        } else {
            Ok(())
        }
    }
}

impl SubscriptionRepository for FlakyStore {
    async fn list_recipient_subscriptions(
        &self,
        recipient: &Recipient,
    ) -> Result<Vec<Subscription>, RepositoryError> {
        self.check(StoreOp::List)?;
        self.inner.list_recipient_subscriptions(recipient).await
    }

    async fn create_subscription(
        &self,
        recipient: &Recipient,
        subscription: &Subscription,
    ) -> Result<(), RepositoryError> {
        self.check(StoreOp::Create)?;
        self.inner.create_subscription(recipient, subscription).await
    }

    async fn delete_subscription(
        &self,
        recipient: &Recipient,
        topic: &TopicKey,
    ) -> Result<bool, RepositoryError> {
        self.check(StoreOp::Delete)?;
        self.inner.delete_subscription(recipient, topic).await
    }

    async fn delete_all_subscriptions(&self, recipient: &Recipient) -> Result<u64, RepositoryError> {
        self.check(StoreOp::DeleteAll)?;
        self.inner.delete_all_subscriptions(recipient).await
    }

    async fn list_topics_with_recipients(&self) -> Result<Vec<Topic>, RepositoryError> {
        self.check(StoreOp::Topics)?;
        self.inner.list_topics_with_recipients().await
    }

    async fn is_chapter_notified(
        &self,
        topic: &TopicKey,
        chapter: &Chapter,
    ) -> Result<bool, RepositoryError> {
        self.check(StoreOp::IsNotified)?;
        self.inner.is_chapter_notified(topic, chapter).await
    }

    async fn record_topic_check(
        &self,
        topic: &TopicKey,
        chapters: &[Chapter],
        checked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.check(StoreOp::RecordCheck)?;
        self.inner.record_topic_check(topic, chapters, checked_at).await
    }
}
