//! Subscription service: subscribe/unsubscribe merge rules and the
//! per-topic update detection run by the periodic poll.
//!
//! Every call re-reads the store; nothing is cached between calls.

use std::collections::HashSet;

use chrono::Utc;
use mangawatch_types::error::SubscriptionError;
use mangawatch_types::manga::{Chapter, Manga};
use mangawatch_types::subscription::{Language, Recipient, Subscription, Topic, Update};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog::CatalogClient;
use crate::repository::subscription::SubscriptionRepository;

/// Orchestrates subscriptions, topics, and update detection.
///
/// Generic over `SubscriptionRepository` and `CatalogClient` to maintain
/// clean architecture (mangawatch-core never depends on mangawatch-infra).
pub struct SubscriptionService<R: SubscriptionRepository, C: CatalogClient> {
    repo: R,
    catalog: C,
}

impl<R: SubscriptionRepository, C: CatalogClient> SubscriptionService<R, C> {
    pub fn new(repo: R, catalog: C) -> Self {
        Self { repo, catalog }
    }

    /// Access the subscription repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Access the catalog client.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Fetch manga metadata straight from the catalog.
    pub async fn manga(&self, manga_id: &str) -> Result<Manga, SubscriptionError> {
        Ok(self.catalog.fetch_manga(manga_id).await?)
    }

    /// All active subscriptions of a recipient.
    pub async fn list(&self, recipient: &Recipient) -> Result<Vec<Subscription>, SubscriptionError> {
        Ok(self.repo.list_recipient_subscriptions(recipient).await?)
    }

    /// Subscribe a recipient to a manga in `language`.
    ///
    /// Merge rules against the recipient's existing subscriptions to the
    /// same manga:
    /// - exact language already held: `AlreadySubscribed`
    /// - wildcard requested: every concrete subscription is removed
    /// - concrete requested while holding only the wildcard: the wildcard is
    ///   removed
    /// - otherwise concrete languages accumulate
    ///
    /// The removals happen before the catalog lookup and are not restored if
    /// the lookup or the insert fails.
    pub async fn subscribe(
        &self,
        recipient: &Recipient,
        manga_id: &str,
        language: Language,
    ) -> Result<Subscription, SubscriptionError> {
        let existing: Vec<Subscription> = self
            .repo
            .list_recipient_subscriptions(recipient)
            .await?
            .into_iter()
            .filter(|s| s.manga_id == manga_id)
            .collect();

        if let Some(current) = existing.iter().find(|s| s.language == language) {
            return Err(SubscriptionError::AlreadySubscribed {
                title: current.manga_title.clone(),
                language: current.language.clone(),
            });
        }

        if supersedes(&language, &existing) {
            for old in &existing {
                self.repo
                    .delete_subscription(recipient, &old.topic_key())
                    .await?;
                debug!(
                    recipient = %recipient,
                    manga_id,
                    language = %old.language,
                    "superseded subscription removed"
                );
            }
        }

        let manga = self.catalog.fetch_manga(manga_id).await?;

        let subscription = Subscription {
            manga_id: manga_id.to_string(),
            manga_title: manga.display_title(),
            language,
        };
        self.repo
            .create_subscription(recipient, &subscription)
            .await?;

        info!(
            recipient = %recipient,
            manga_id,
            language = %subscription.language,
            "subscribed"
        );
        Ok(subscription)
    }

    /// Remove the exact (manga, language) subscription and return it.
    pub async fn unsubscribe(
        &self,
        recipient: &Recipient,
        manga_id: &str,
        language: &Language,
    ) -> Result<Subscription, SubscriptionError> {
        let removed = self
            .repo
            .list_recipient_subscriptions(recipient)
            .await?
            .into_iter()
            .find(|s| s.matches(manga_id, language))
            .ok_or(SubscriptionError::NoSuchSubscription)?;

        self.repo
            .delete_subscription(recipient, &removed.topic_key())
            .await?;

        info!(recipient = %recipient, manga_id, language = %language, "unsubscribed");
        Ok(removed)
    }

    /// Drop every subscription of a recipient (e.g. it became unreachable).
    pub async fn unsubscribe_all(&self, recipient: &Recipient) -> Result<(), SubscriptionError> {
        let removed = self.repo.delete_all_subscriptions(recipient).await?;
        info!(recipient = %recipient, removed, "all subscriptions removed");
        Ok(())
    }

    /// Run one update-detection pass over every topic.
    ///
    /// For each topic: fetch chapters published since its checkpoint, drop
    /// chapters already notified or repeated within the feed, then record the
    /// survivors and advance the checkpoint before anything is delivered.
    /// Cancellation is checked between topics; a failure on any topic aborts
    /// the pass, keeping what earlier topics already persisted.
    pub async fn updates(&self, cancel: &CancellationToken) -> Result<Vec<Update>, SubscriptionError> {
        let topics = self.repo.list_topics_with_recipients().await?;
        let mut updates = Vec::new();

        for topic in topics {
            if cancel.is_cancelled() {
                return Err(SubscriptionError::Interrupted);
            }

            // Taken before the fetch so chapters published mid-request are
            // seen again next pass; the notified history filters them.
            let checked_at = Utc::now();
            let chapters = self.new_chapters(&topic).await?;

            self.repo
                .record_topic_check(&topic.key, &chapters, checked_at)
                .await?;

            if chapters.is_empty() {
                continue;
            }

            debug!(topic = %topic.key, count = chapters.len(), "new chapters detected");
            updates.push(Update {
                manga_id: topic.key.manga_id.clone(),
                manga_title: topic.manga_title,
                language: topic.key.language,
                new_chapters: chapters,
                recipients: topic.recipients,
            });
        }

        Ok(updates)
    }

    /// Chapters published since the topic checkpoint that have not been
    /// notified yet, in feed order, each `(volume, chapter)` at most once.
    async fn new_chapters(&self, topic: &Topic) -> Result<Vec<Chapter>, SubscriptionError> {
        let feed = self
            .catalog
            .fetch_new_chapters(
                &topic.key.manga_id,
                topic.key.language.filter(),
                Some(topic.checked_at),
            )
            .await?;

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut chapters = Vec::new();
        for chapter in feed {
            let key = (chapter.volume.clone(), chapter.chapter.clone());
            if seen.contains(&key) {
                continue;
            }
            if self.repo.is_chapter_notified(&topic.key, &chapter).await? {
                continue;
            }
            seen.insert(key);
            chapters.push(chapter);
        }
        Ok(chapters)
    }
}

/// Whether subscribing to `requested` removes the recipient's `existing`
/// subscriptions to the same manga.
fn supersedes(requested: &Language, existing: &[Subscription]) -> bool {
    match existing {
        [] => false,
        [only] if only.language.is_any() => true,
        _ => requested.is_any(),
    }
}
