//! SQLite subscription repository implementation.
//!
//! Implements `SubscriptionRepository` from `mangawatch-core` using sqlx with
//! split read/write pools. Topics are created on first subscribe and removed
//! with their last subscriber; notified-chapter history goes with them via
//! `ON DELETE CASCADE`.

use chrono::{DateTime, Utc};
use mangawatch_core::repository::subscription::SubscriptionRepository;
use mangawatch_types::error::RepositoryError;
use mangawatch_types::manga::Chapter;
use mangawatch_types::subscription::{Language, Recipient, Subscription, Topic, TopicKey};
use sqlx::Row;
use tracing::debug;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SubscriptionRepository`.
pub struct SqliteSubscriptionRepository {
    pool: DatabasePool,
}

impl SqliteSubscriptionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct TopicRecipientRow {
    topic_id: i64,
    manga_id: String,
    language: String,
    manga_title: String,
    checked_at: String,
    recipient: String,
}

impl TopicRecipientRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            topic_id: row.try_get("id")?,
            manga_id: row.try_get("manga_id")?,
            language: row.try_get("language")?,
            manga_title: row.try_get("manga_title")?,
            checked_at: row.try_get("checked_at")?,
            recipient: row.try_get("recipient")?,
        })
    }

    fn into_topic(self) -> Result<Topic, RepositoryError> {
        let checked_at = parse_datetime(&self.checked_at)?;

        Ok(Topic {
            key: TopicKey {
                manga_id: self.manga_id,
                language: Language::code(self.language),
            },
            manga_title: self.manga_title,
            checked_at,
            recipients: vec![Recipient::new(self.recipient)],
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_subscription(row: &sqlx::sqlite::SqliteRow) -> Result<Subscription, RepositoryError> {
    let manga_id: String = row
        .try_get("manga_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let language: String = row
        .try_get("language")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let manga_title: String = row
        .try_get("manga_title")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(Subscription {
        manga_id,
        manga_title,
        language: Language::code(language),
    })
}

// ---------------------------------------------------------------------------
// SubscriptionRepository implementation
// ---------------------------------------------------------------------------

impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn list_recipient_subscriptions(
        &self,
        recipient: &Recipient,
    ) -> Result<Vec<Subscription>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT t.manga_id, t.language, t.manga_title
             FROM topic_subscriptions s
             JOIN topics t ON t.id = s.topic_id
             WHERE s.recipient = ?
             ORDER BY t.manga_title, t.language",
        )
        .bind(recipient.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_subscription).collect()
    }

    async fn create_subscription(
        &self,
        recipient: &Recipient,
        subscription: &Subscription,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // An existing topic keeps its checkpoint; only the title is refreshed.
        let now = format_datetime(&Utc::now());
        let row = sqlx::query(
            "INSERT INTO topics (manga_id, language, manga_title, checked_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (manga_id, language) DO UPDATE SET manga_title = excluded.manga_title
             RETURNING id",
        )
        .bind(&subscription.manga_id)
        .bind(subscription.language.as_str())
        .bind(&subscription.manga_title)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let topic_id: i64 = row
            .try_get("id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT OR IGNORE INTO topic_subscriptions (topic_id, recipient, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(topic_id)
        .bind(recipient.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        debug!(recipient = %recipient, topic = %subscription.topic_key(), "subscription stored");
        Ok(())
    }

    async fn delete_subscription(
        &self,
        recipient: &Recipient,
        topic: &TopicKey,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "DELETE FROM topic_subscriptions
             WHERE recipient = ?
               AND topic_id = (SELECT id FROM topics WHERE manga_id = ? AND language = ?)",
        )
        .bind(recipient.as_str())
        .bind(&topic.manga_id)
        .bind(topic.language.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "DELETE FROM topics
             WHERE manga_id = ? AND language = ?
               AND NOT EXISTS (SELECT 1 FROM topic_subscriptions s WHERE s.topic_id = topics.id)",
        )
        .bind(&topic.manga_id)
        .bind(topic.language.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_subscriptions(&self, recipient: &Recipient) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query("DELETE FROM topic_subscriptions WHERE recipient = ?")
            .bind(recipient.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let orphans = sqlx::query(
            "DELETE FROM topics
             WHERE NOT EXISTS (SELECT 1 FROM topic_subscriptions s WHERE s.topic_id = topics.id)",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        debug!(
            recipient = %recipient,
            subscriptions = result.rows_affected(),
            topics = orphans.rows_affected(),
            "subscriptions purged"
        );
        Ok(result.rows_affected())
    }

    async fn list_topics_with_recipients(&self) -> Result<Vec<Topic>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT t.id, t.manga_id, t.language, t.manga_title, t.checked_at, s.recipient
             FROM topics t
             JOIN topic_subscriptions s ON s.topic_id = t.id
             ORDER BY t.id, s.recipient",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Rows arrive grouped by topic id; fold consecutive rows together.
        let mut topics: Vec<Topic> = Vec::new();
        let mut current_id: Option<i64> = None;
        for row in &rows {
            let row = TopicRecipientRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

            match topics.last_mut() {
                Some(topic) if current_id == Some(row.topic_id) => {
                    topic.recipients.push(Recipient::new(row.recipient));
                }
                _ => {
                    current_id = Some(row.topic_id);
                    topics.push(row.into_topic()?);
                }
            }
        }

        Ok(topics)
    }

    async fn is_chapter_notified(
        &self,
        topic: &TopicKey,
        chapter: &Chapter,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            "SELECT 1 AS hit
             FROM notified_chapters n
             JOIN topics t ON t.id = n.topic_id
             WHERE t.manga_id = ? AND t.language = ? AND n.volume = ? AND n.chapter = ?
             LIMIT 1",
        )
        .bind(&topic.manga_id)
        .bind(topic.language.as_str())
        .bind(&chapter.volume)
        .bind(&chapter.chapter)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn record_topic_check(
        &self,
        topic: &TopicKey,
        chapters: &[Chapter],
        checked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query("SELECT id FROM topics WHERE manga_id = ? AND language = ?")
            .bind(&topic.manga_id)
            .bind(topic.language.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            debug!(topic = %topic, "topic gone before check was recorded");
            return Ok(());
        };
        let topic_id: i64 = row
            .try_get("id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let now = format_datetime(&Utc::now());
        for chapter in chapters {
            sqlx::query(
                "INSERT OR IGNORE INTO notified_chapters (topic_id, volume, chapter, notified_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(topic_id)
            .bind(&chapter.volume)
            .bind(&chapter.chapter)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        sqlx::query("UPDATE topics SET checked_at = ? WHERE id = ?")
            .bind(format_datetime(&checked_at))
            .bind(topic_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
