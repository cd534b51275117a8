//! In-process store implementing both repository traits, for tests.
//!
//! Everything lives behind one `RwLock`, so every trait method is atomic
//! with respect to the others.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use mangawatch_types::error::RepositoryError;
use mangawatch_types::manga::Chapter;
use mangawatch_types::subscription::{Recipient, Subscription, Topic, TopicKey};
use tokio::sync::RwLock;

use super::conversation::ConversationRepository;
use super::subscription::SubscriptionRepository;

#[derive(Debug)]
struct TopicRecord {
    title: String,
    checked_at: DateTime<Utc>,
    recipients: BTreeSet<Recipient>,
    notified: HashSet<(String, String)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    topics: BTreeMap<TopicKey, TopicRecord>,
    conversations: HashMap<Recipient, String>,
}

/// Volatile store for subscriptions, topics, and conversation contexts.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live topics.
    pub async fn topic_count(&self) -> usize {
        self.state.read().await.topics.len()
    }

    /// Checkpoint of a topic, if the topic exists.
    pub async fn checkpoint(&self, topic: &TopicKey) -> Option<DateTime<Utc>> {
        self.state.read().await.topics.get(topic).map(|t| t.checked_at)
    }
}

impl SubscriptionRepository for InMemoryStore {
    async fn list_recipient_subscriptions(
        &self,
        recipient: &Recipient,
    ) -> Result<Vec<Subscription>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .topics
            .iter()
            .filter(|(_, t)| t.recipients.contains(recipient))
            .map(|(key, t)| Subscription {
                manga_id: key.manga_id.clone(),
                manga_title: t.title.clone(),
                language: key.language.clone(),
            })
            .collect())
    }

    async fn create_subscription(
        &self,
        recipient: &Recipient,
        subscription: &Subscription,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let topic = state
            .topics
            .entry(subscription.topic_key())
            .or_insert_with(|| TopicRecord {
                title: subscription.manga_title.clone(),
                checked_at: Utc::now(),
                recipients: BTreeSet::new(),
                notified: HashSet::new(),
            });
        topic.title = subscription.manga_title.clone();
        topic.recipients.insert(recipient.clone());
        Ok(())
    }

    async fn delete_subscription(
        &self,
        recipient: &Recipient,
        topic: &TopicKey,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(record) = state.topics.get_mut(topic) else {
            return Ok(false);
        };
        let removed = record.recipients.remove(recipient);
        if record.recipients.is_empty() {
            state.topics.remove(topic);
        }
        Ok(removed)
    }

    async fn delete_all_subscriptions(&self, recipient: &Recipient) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let mut removed = 0;
        for record in state.topics.values_mut() {
            if record.recipients.remove(recipient) {
                removed += 1;
            }
        }
        state.topics.retain(|_, t| !t.recipients.is_empty());
        Ok(removed)
    }

    async fn list_topics_with_recipients(&self) -> Result<Vec<Topic>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .topics
            .iter()
            .map(|(key, t)| Topic {
                key: key.clone(),
                manga_title: t.title.clone(),
                checked_at: t.checked_at,
                recipients: t.recipients.iter().cloned().collect(),
            })
            .collect())
    }

    async fn is_chapter_notified(
        &self,
        topic: &TopicKey,
        chapter: &Chapter,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.topics.get(topic).is_some_and(|t| {
            t.notified
                .contains(&(chapter.volume.clone(), chapter.chapter.clone()))
        }))
    }

    async fn record_topic_check(
        &self,
        topic: &TopicKey,
        chapters: &[Chapter],
        checked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(record) = state.topics.get_mut(topic) {
            for chapter in chapters {
                record
                    .notified
                    .insert((chapter.volume.clone(), chapter.chapter.clone()));
            }
            record.checked_at = checked_at;
        }
        Ok(())
    }
}

impl ConversationRepository for InMemoryStore {
    async fn find_conversation(
        &self,
        recipient: &Recipient,
    ) -> Result<Option<String>, RepositoryError> {
        Ok(self.state.read().await.conversations.get(recipient).cloned())
    }

    async fn upsert_conversation(
        &self,
        recipient: &Recipient,
        command: &str,
    ) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .conversations
            .insert(recipient.clone(), command.to_string());
        Ok(())
    }

    async fn delete_conversation(&self, recipient: &Recipient) -> Result<(), RepositoryError> {
        self.state.write().await.conversations.remove(recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangawatch_types::subscription::Language;

    fn sub(manga_id: &str, language: Language) -> Subscription {
        Subscription {
            manga_id: manga_id.to_string(),
            manga_title: format!("Title {manga_id}"),
            language,
        }
    }

    fn chapter(volume: &str, number: &str) -> Chapter {
        Chapter {
            id: format!("{volume}-{number}"),
            title: String::new(),
            volume: volume.to_string(),
            chapter: number.to_string(),
            external_url: None,
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_shared_topic_for_same_key() {
        let store = InMemoryStore::new();
        let s = sub("abc", Language::code("en"));
        store.create_subscription(&Recipient::from("1"), &s).await.unwrap();
        store.create_subscription(&Recipient::from("2"), &s).await.unwrap();

        let topics = store.list_topics_with_recipients().await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(
            topics[0].recipients,
            vec![Recipient::from("1"), Recipient::from("2")]
        );
    }

    #[tokio::test]
    async fn test_last_unsubscribe_deletes_topic_and_history() {
        let store = InMemoryStore::new();
        let r = Recipient::from("1");
        let s = sub("abc", Language::Any);
        store.create_subscription(&r, &s).await.unwrap();
        store
            .record_topic_check(&s.topic_key(), &[chapter("1", "1")], Utc::now())
            .await
            .unwrap();

        assert!(store.delete_subscription(&r, &s.topic_key()).await.unwrap());
        assert_eq!(store.topic_count().await, 0);

        let resubscribed = Utc::now();
        store.create_subscription(&r, &s).await.unwrap();
        let notified = store
            .is_chapter_notified(&s.topic_key(), &chapter("1", "1"))
            .await
            .unwrap();
        assert!(!notified, "history should be discarded with the topic");
        let checkpoint = store.checkpoint(&s.topic_key()).await.unwrap();
        assert!(checkpoint >= resubscribed, "a recreated topic starts a fresh checkpoint");
    }

    #[tokio::test]
    async fn test_joining_topic_keeps_its_checkpoint() {
        let store = InMemoryStore::new();
        let s = sub("abc", Language::code("en"));
        store.create_subscription(&Recipient::from("1"), &s).await.unwrap();
        let polled = Utc::now() - chrono::Duration::hours(1);
        store.record_topic_check(&s.topic_key(), &[], polled).await.unwrap();

        store.create_subscription(&Recipient::from("2"), &s).await.unwrap();
        assert_eq!(store.checkpoint(&s.topic_key()).await, Some(polled));
    }

    #[tokio::test]
    async fn test_delete_missing_subscription_returns_false() {
        let store = InMemoryStore::new();
        let key = sub("abc", Language::Any).topic_key();
        assert!(!store.delete_subscription(&Recipient::from("1"), &key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_keeps_shared_topics() {
        let store = InMemoryStore::new();
        let (a, b) = (Recipient::from("a"), Recipient::from("b"));
        store.create_subscription(&a, &sub("x", Language::Any)).await.unwrap();
        store.create_subscription(&a, &sub("y", Language::Any)).await.unwrap();
        store.create_subscription(&b, &sub("y", Language::Any)).await.unwrap();

        assert_eq!(store.delete_all_subscriptions(&a).await.unwrap(), 2);
        let topics = store.list_topics_with_recipients().await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].key.manga_id, "y");
        assert!(store.list_recipient_subscriptions(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_check_on_missing_topic_is_noop() {
        let store = InMemoryStore::new();
        let key = sub("gone", Language::Any).topic_key();
        store
            .record_topic_check(&key, &[chapter("1", "1")], Utc::now())
            .await
            .unwrap();
        assert_eq!(store.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_conversation_upsert_and_delete() {
        let store = InMemoryStore::new();
        let r = Recipient::from("1");
        assert!(store.find_conversation(&r).await.unwrap().is_none());

        store.upsert_conversation(&r, "subscribe").await.unwrap();
        store.upsert_conversation(&r, "unsubscribe").await.unwrap();
        assert_eq!(
            store.find_conversation(&r).await.unwrap().as_deref(),
            Some("unsubscribe")
        );

        store.delete_conversation(&r).await.unwrap();
        store.delete_conversation(&r).await.unwrap();
        assert!(store.find_conversation(&r).await.unwrap().is_none());
    }
}
