//! Conversation context repository trait definition.

use mangawatch_types::error::RepositoryError;
use mangawatch_types::subscription::Recipient;

/// Repository trait for the per-recipient pending command.
///
/// At most one record exists per recipient.
pub trait ConversationRepository: Send + Sync {
    /// Get the pending command for a recipient, if any.
    fn find_conversation(
        &self,
        recipient: &Recipient,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Set the pending command (upsert, replaces any existing one).
    fn upsert_conversation(
        &self,
        recipient: &Recipient,
        command: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete the pending command. No-op if none exists.
    fn delete_conversation(
        &self,
        recipient: &Recipient,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
