//! Notification dispatcher.
//!
//! Runs update detection, delivers each Update to every recipient of its
//! Topic, and cleans up recipients whose delivery failed permanently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mangawatch_observe::metrics;
use mangawatch_types::error::SubscriptionError;
use mangawatch_types::subscription::Recipient;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::notifier::{DeliveryOutcome, Notifier};
use crate::catalog::CatalogClient;
use crate::repository::conversation::ConversationRepository;
use crate::repository::subscription::SubscriptionRepository;
use crate::service::conversation::ConversationService;
use crate::service::subscription::SubscriptionService;

/// Counters for one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub updates: usize,
    pub delivered: usize,
    pub transient: usize,
    pub permanent: usize,
    /// Deliveries not attempted because the recipient failed permanently
    /// earlier in the same pass.
    pub skipped: usize,
}

/// Fans updates out through a `Notifier`.
pub struct Dispatcher<R, C, V, N>
where
    R: SubscriptionRepository,
    C: CatalogClient,
    V: ConversationRepository,
    N: Notifier,
{
    subscriptions: Arc<SubscriptionService<R, C>>,
    conversations: Arc<ConversationService<V>>,
    notifier: Arc<N>,
}

impl<R, C, V, N> Clone for Dispatcher<R, C, V, N>
where
    R: SubscriptionRepository,
    C: CatalogClient,
    V: ConversationRepository,
    N: Notifier,
{
    fn clone(&self) -> Self {
        Self {
            subscriptions: Arc::clone(&self.subscriptions),
            conversations: Arc::clone(&self.conversations),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<R, C, V, N> Dispatcher<R, C, V, N>
where
    R: SubscriptionRepository,
    C: CatalogClient,
    V: ConversationRepository,
    N: Notifier,
{
    pub fn new(
        subscriptions: Arc<SubscriptionService<R, C>>,
        conversations: Arc<ConversationService<V>>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            subscriptions,
            conversations,
            notifier,
        }
    }

    /// One detection pass followed by delivery of everything it found.
    ///
    /// Updates are recorded by the store before delivery starts, so a
    /// transient delivery failure is not retried on the next pass.
    pub async fn run_once(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, SubscriptionError> {
        let updates = self.subscriptions.updates(cancel).await?;
        let mut report = DispatchReport {
            updates: updates.len(),
            ..DispatchReport::default()
        };
        let mut unreachable: HashSet<Recipient> = HashSet::new();

        for update in &updates {
            for recipient in &update.recipients {
                if unreachable.contains(recipient) {
                    report.skipped += 1;
                    continue;
                }

                match self.notifier.deliver(recipient, update).await {
                    DeliveryOutcome::Delivered => {
                        report.delivered += 1;
                        metrics::record_delivery("delivered");
                        debug!(recipient = %recipient, manga_id = %update.manga_id, "delivered");
                    }
                    DeliveryOutcome::TransientFailure(reason) => {
                        report.transient += 1;
                        metrics::record_delivery("transient");
                        metrics::record_error("transport");
                        warn!(
                            recipient = %recipient,
                            manga_id = %update.manga_id,
                            reason = %reason,
                            "delivery failed"
                        );
                    }
                    DeliveryOutcome::PermanentFailure(reason) => {
                        report.permanent += 1;
                        metrics::record_delivery("permanent");
                        metrics::record_error("transport");
                        warn!(
                            recipient = %recipient,
                            reason = %reason,
                            "recipient unreachable, removing subscriptions"
                        );
                        self.drop_recipient(recipient).await;
                        unreachable.insert(recipient.clone());
                    }
                }
            }
        }

        Ok(report)
    }

    async fn drop_recipient(&self, recipient: &Recipient) {
        if let Err(e) = self.subscriptions.unsubscribe_all(recipient).await {
            error!(recipient = %recipient, error = %e, "failed to remove subscriptions");
        }
        if let Err(e) = self.conversations.clear_context(recipient).await {
            error!(recipient = %recipient, error = %e, "failed to clear conversation context");
        }
    }
}

impl<R, C, V, N> Dispatcher<R, C, V, N>
where
    R: SubscriptionRepository + 'static,
    C: CatalogClient + 'static,
    V: ConversationRepository + 'static,
    N: Notifier + 'static,
{
    /// Poll forever: one pass immediately, then one per `period`.
    ///
    /// Passes never overlap. Each pass runs in its own task so that an
    /// error or panic is logged and the next tick still fires. Returns once
    /// `cancel` fires; an in-flight pass stops at its next topic.
    pub async fn run(&self, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let pass = self.clone();
            let pass_cancel = cancel.child_token();
            let handle = tokio::spawn(async move { pass.run_once(&pass_cancel).await });

            match handle.await {
                Ok(Ok(report)) => info!(
                    updates = report.updates,
                    delivered = report.delivered,
                    transient = report.transient,
                    permanent = report.permanent,
                    "poll pass complete"
                ),
                Ok(Err(e)) if e.is_interrupted() => info!("poll pass interrupted"),
                Ok(Err(e)) => {
                    metrics::record_error(e.kind());
                    error!(error = %e, "poll pass failed");
                }
                Err(e) if e.is_panic() => {
                    metrics::record_error("panic");
                    error!("poll pass panicked");
                }
                Err(e) => error!(error = %e, "poll pass aborted"),
            }
        }

        info!("dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Utc};
    use mangawatch_types::error::CatalogError;
    use mangawatch_types::manga::{Chapter, Manga};
    use mangawatch_types::subscription::{Language, Update};

    use super::*;
    use crate::repository::memory::InMemoryStore;
    use crate::testing::{ScriptedCatalog, chapter};

    #[derive(Default)]
    struct ScriptedNotifier {
        outcomes: Mutex<HashMap<Recipient, DeliveryOutcome>>,
        sent: Mutex<Vec<(Recipient, String)>>,
    }

    impl ScriptedNotifier {
        fn answer(&self, recipient: Recipient, outcome: DeliveryOutcome) {
            self.outcomes.lock().unwrap().insert(recipient, outcome);
        }

        fn sent(&self) -> Vec<(Recipient, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for ScriptedNotifier {
        async fn deliver(&self, recipient: &Recipient, update: &Update) -> DeliveryOutcome {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.clone(), update.manga_id.clone()));
            self.outcomes
                .lock()
                .unwrap()
                .get(recipient)
                .cloned()
                .unwrap_or(DeliveryOutcome::Delivered)
        }
    }

    type TestDispatcher = Dispatcher<InMemoryStore, ScriptedCatalog, InMemoryStore, ScriptedNotifier>;

    struct Fixture {
        subscriptions: Arc<SubscriptionService<InMemoryStore, ScriptedCatalog>>,
        conversations: Arc<ConversationService<InMemoryStore>>,
        notifier: Arc<ScriptedNotifier>,
        dispatcher: TestDispatcher,
    }

    fn fixture() -> Fixture {
        let subscriptions = Arc::new(SubscriptionService::new(
            InMemoryStore::new(),
            ScriptedCatalog::new()
                .with_manga("abc", "ABC Manga")
                .with_manga("xyz", "XYZ Manga"),
        ));
        let conversations = Arc::new(ConversationService::new(InMemoryStore::new()));
        let notifier = Arc::new(ScriptedNotifier::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&subscriptions),
            Arc::clone(&conversations),
            Arc::clone(&notifier),
        );
        Fixture {
            subscriptions,
            conversations,
            notifier,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_run_once_delivers_to_every_recipient() {
        let f = fixture();
        for id in [1_i64, 2] {
            f.subscriptions
                .subscribe(&Recipient::from(id), "abc", Language::Any)
                .await
                .unwrap();
        }
        f.subscriptions.catalog().set_feed("abc", vec![chapter("1", "1")]);

        let report = f.dispatcher.run_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            report,
            DispatchReport {
                updates: 1,
                delivered: 2,
                ..DispatchReport::default()
            }
        );
        assert_eq!(f.notifier.sent().len(), 2);

        let again = f.dispatcher.run_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(again, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_permanent_failure_removes_recipient() {
        let f = fixture();
        let (gone, stays) = (Recipient::from(1_i64), Recipient::from(2_i64));
        for r in [&gone, &stays] {
            f.subscriptions.subscribe(r, "abc", Language::Any).await.unwrap();
            f.subscriptions.subscribe(r, "xyz", Language::Any).await.unwrap();
        }
        f.conversations.set_context(&gone, "subscribe").await.unwrap();
        f.subscriptions.catalog().set_feed("abc", vec![chapter("1", "1")]);
        f.subscriptions.catalog().set_feed("xyz", vec![chapter("1", "1")]);
        f.notifier.answer(
            gone.clone(),
            DeliveryOutcome::PermanentFailure("forbidden".to_string()),
        );

        let report = f.dispatcher.run_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.updates, 2);
        assert_eq!(report.permanent, 1);
        assert_eq!(report.skipped, 1, "second update is not sent to a gone recipient");
        assert_eq!(report.delivered, 2);

        assert!(f.subscriptions.list(&gone).await.unwrap().is_empty());
        assert!(f.conversations.context(&gone).await.unwrap().is_none());
        assert_eq!(f.subscriptions.list(&stays).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_subscriptions() {
        let f = fixture();
        let r = Recipient::from(1_i64);
        f.subscriptions.subscribe(&r, "abc", Language::Any).await.unwrap();
        f.subscriptions.catalog().set_feed("abc", vec![chapter("1", "1")]);
        f.notifier
            .answer(r.clone(), DeliveryOutcome::TransientFailure("timeout".to_string()));

        let report = f.dispatcher.run_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.transient, 1);
        assert_eq!(f.subscriptions.list(&r).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_propagates_interruption() {
        let f = fixture();
        f.subscriptions
            .subscribe(&Recipient::from(1_i64), "abc", Language::Any)
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f.dispatcher.run_once(&cancel).await.unwrap_err();
        assert!(err.is_interrupted());
        assert!(f.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_run_passes_immediately_and_stops_on_cancel() {
        let f = fixture();
        f.subscriptions
            .subscribe(&Recipient::from(1_i64), "abc", Language::Any)
            .await
            .unwrap();
        f.subscriptions.catalog().set_feed("abc", vec![chapter("1", "1")]);

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            f.dispatcher.run(Duration::from_secs(3600), cancel),
        )
        .await
        .expect("dispatcher should stop after cancellation");

        assert_eq!(f.notifier.sent().len(), 1);
    }

    /// Catalog whose feed panics; cancels the loop after `limit` calls.
    struct PanickingCatalog {
        calls: AtomicUsize,
        limit: usize,
        cancel: CancellationToken,
    }

    impl CatalogClient for PanickingCatalog {
        async fn fetch_manga(&self, manga_id: &str) -> Result<Manga, CatalogError> {
            Ok(Manga {
                id: manga_id.to_string(),
                ..Manga::default()
            })
        }

        async fn fetch_new_chapters(
            &self,
            _manga_id: &str,
            _language: Option<&str>,
            _published_since: Option<DateTime<Utc>>,
        ) -> Result<Vec<Chapter>, CatalogError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.limit {
                self.cancel.cancel();
            }
            panic!("catalog exploded");
        }
    }

    #[tokio::test]
    async fn test_run_survives_panicking_pass() {
        let cancel = CancellationToken::new();
        let subscriptions = Arc::new(SubscriptionService::new(
            InMemoryStore::new(),
            PanickingCatalog {
                calls: AtomicUsize::new(0),
                limit: 2,
                cancel: cancel.clone(),
            },
        ));
        subscriptions
            .subscribe(&Recipient::from(1_i64), "abc", Language::Any)
            .await
            .unwrap();
        let dispatcher = Dispatcher::new(
            Arc::clone(&subscriptions),
            Arc::new(ConversationService::new(InMemoryStore::new())),
            Arc::new(ScriptedNotifier::default()),
        );

        tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.run(Duration::from_millis(10), cancel),
        )
        .await
        .expect("dispatcher should keep ticking after a panic");

        assert_eq!(subscriptions.catalog().calls.load(Ordering::SeqCst), 2);
    }
}
