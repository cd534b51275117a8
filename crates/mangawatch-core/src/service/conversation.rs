//! Conversation context service.
//!
//! Tracks the one multi-step command a recipient may have open (e.g. "waiting
//! for a manga link after /subscribe"). The state is flat: either empty or a
//! single pending command name.

use mangawatch_types::error::{ConversationError, RepositoryError};
use mangawatch_types::subscription::Recipient;
use tracing::debug;

use crate::repository::conversation::ConversationRepository;

/// Per-recipient pending command tracking.
pub struct ConversationService<R: ConversationRepository> {
    repo: R,
}

impl<R: ConversationRepository> ConversationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// The pending command for a recipient, or `None` in the neutral state.
    pub async fn context(&self, recipient: &Recipient) -> Result<Option<String>, RepositoryError> {
        self.repo.find_conversation(recipient).await
    }

    /// Replace any pending command (last write wins).
    pub async fn set_context(
        &self,
        recipient: &Recipient,
        command: &str,
    ) -> Result<(), RepositoryError> {
        debug!(recipient = %recipient, command, "setting conversation context");
        self.repo.upsert_conversation(recipient, command).await
    }

    /// Return the recipient to the neutral state. Clearing an empty context
    /// is not an error.
    pub async fn clear_context(&self, recipient: &Recipient) -> Result<(), RepositoryError> {
        debug!(recipient = %recipient, "clearing conversation context");
        self.repo.delete_conversation(recipient).await
    }

    /// Start `command` for a recipient.
    ///
    /// Fails with `CommandInProgress` when a different command is pending.
    /// Restarting the same command is allowed.
    pub async fn begin(&self, recipient: &Recipient, command: &str) -> Result<(), ConversationError> {
        if let Some(pending) = self.context(recipient).await? {
            if pending != command {
                return Err(ConversationError::CommandInProgress(pending));
            }
        }
        self.set_context(recipient, command).await?;
        Ok(())
    }
}
