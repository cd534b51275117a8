//! Delivery port used by the dispatcher.

use mangawatch_types::subscription::{Recipient, Update};
use tracing::info;

/// Classified result of delivering one update to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Worth retrying on a later pass; the recipient keeps its subscriptions.
    TransientFailure(String),
    /// The recipient can no longer be reached (blocked, deleted, forbidden).
    PermanentFailure(String),
}

/// Sends an update to a recipient over some transport.
///
/// Implementations classify failures themselves; the dispatcher only acts on
/// the returned outcome and never sees transport-specific errors.
pub trait Notifier: Send + Sync {
    fn deliver(
        &self,
        recipient: &Recipient,
        update: &Update,
    ) -> impl std::future::Future<Output = DeliveryOutcome> + Send;
}

/// Notifier that only writes a log line per delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn deliver(&self, recipient: &Recipient, update: &Update) -> DeliveryOutcome {
        info!(
            recipient = %recipient,
            manga_id = %update.manga_id,
            language = %update.language,
            chapters = update.new_chapters.len(),
            "update delivered"
        );
        DeliveryOutcome::Delivered
    }
}
