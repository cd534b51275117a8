//! Subscription and topic repository trait definition.
//!
//! Covers three entity families:
//! - **Subscriptions:** recipient-to-topic edges.
//! - **Topics:** one per (manga, language), created with the first
//!   subscription and deleted with the last one.
//! - **Notified chapters:** per-topic dedup history, discarded with the topic.

use chrono::{DateTime, Utc};
use mangawatch_types::error::RepositoryError;
use mangawatch_types::manga::Chapter;
use mangawatch_types::subscription::{Recipient, Subscription, Topic, TopicKey};

/// Repository trait for subscription persistence.
///
/// Implementations live in mangawatch-infra (e.g., `SqliteSubscriptionRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SubscriptionRepository: Send + Sync {
    /// All active subscriptions of a recipient, in no particular order.
    fn list_recipient_subscriptions(
        &self,
        recipient: &Recipient,
    ) -> impl std::future::Future<Output = Result<Vec<Subscription>, RepositoryError>> + Send;

    /// Subscribe a recipient, creating the backing topic if absent.
    ///
    /// A new topic's checkpoint is its creation time; joining an existing
    /// topic leaves the checkpoint alone. Idempotent -- no error if the edge
    /// already exists.
    fn create_subscription(
        &self,
        recipient: &Recipient,
        subscription: &Subscription,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove one subscription. Deletes the topic (and its notified-chapter
    /// history) when no subscribers remain. Returns `true` if the
    /// subscription existed.
    fn delete_subscription(
        &self,
        recipient: &Recipient,
        topic: &TopicKey,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Remove every subscription of a recipient, deleting orphaned topics.
    /// Returns the number of subscriptions removed.
    fn delete_all_subscriptions(
        &self,
        recipient: &Recipient,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Every topic with its checkpoint and full recipient set.
    fn list_topics_with_recipients(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Topic>, RepositoryError>> + Send;

    /// Whether `(volume, chapter)` has already been notified for a topic.
    fn is_chapter_notified(
        &self,
        topic: &TopicKey,
        chapter: &Chapter,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Record `chapters` as notified and advance the topic checkpoint to
    /// `checked_at`, as one atomic write.
    ///
    /// A topic that no longer exists is skipped silently: it was
    /// unsubscribed while the pass was running.
    fn record_topic_check(
        &self,
        topic: &TopicKey,
        chapters: &[Chapter],
        checked_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
