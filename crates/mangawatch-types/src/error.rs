use thiserror::Error;

use crate::subscription::Language;

/// Errors from repository operations (used by trait definitions in mangawatch-core).
///
/// An absent row is not an error: lookups return `Option`/empty collections.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),
}

/// Errors from the external content catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("manga not found")]
    NotFound,

    #[error("catalog request failed: {0}")]
    RequestFailed(String),

    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the subscription service.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("already subscribed to [{language}] {title}")]
    AlreadySubscribed { title: String, language: Language },

    #[error("no such subscription")]
    NoSuchSubscription,

    #[error("manga not found")]
    MangaNotFound,

    #[error(transparent)]
    Catalog(CatalogError),

    #[error(transparent)]
    Storage(#[from] RepositoryError),

    #[error("interrupted: update pass cancelled")]
    Interrupted,
}

impl SubscriptionError {
    /// Expected outcomes of valid input. These are translated into a user
    /// message by the caller and never logged as failures.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            SubscriptionError::AlreadySubscribed { .. }
                | SubscriptionError::NoSuchSubscription
                | SubscriptionError::MangaNotFound
        )
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, SubscriptionError::Interrupted)
    }

    /// Failure family, used as the `kind` label of the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            SubscriptionError::Storage(_) => "database",
            SubscriptionError::Catalog(_) | SubscriptionError::MangaNotFound => "catalog",
            SubscriptionError::Interrupted => "interrupted",
            SubscriptionError::AlreadySubscribed { .. } | SubscriptionError::NoSuchSubscription => {
                "user"
            }
        }
    }
}

impl From<CatalogError> for SubscriptionError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound => SubscriptionError::MangaNotFound,
            other => SubscriptionError::Catalog(other),
        }
    }
}

/// Errors surfaced by the conversation service.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("command '{0}' is already in progress")]
    CommandInProgress(String),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}
