//! Application state wiring all services together.
//!
//! Services are generic over repository and catalog traits; AppState pins
//! them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use mangawatch_core::service::conversation::ConversationService;
use mangawatch_core::service::subscription::SubscriptionService;
use mangawatch_infra::catalog::mangadex::MangaDexClient;
use mangawatch_infra::config::{load_global_config, resolve_data_dir, resolve_database_url};
use mangawatch_infra::sqlite::conversation::SqliteConversationRepository;
use mangawatch_infra::sqlite::pool::DatabasePool;
use mangawatch_infra::sqlite::subscription::SqliteSubscriptionRepository;
use mangawatch_types::config::GlobalConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteSubscriptionService =
    SubscriptionService<SqliteSubscriptionRepository, MangaDexClient>;

pub type ConcreteConversationService = ConversationService<SqliteConversationRepository>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub subscription_service: Arc<ConcreteSubscriptionService>,
    pub conversation_service: Arc<ConcreteConversationService>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load configuration, open the database, and wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let db_pool = DatabasePool::new(&resolve_database_url(&config, &data_dir)).await?;

        let subscription_service = SubscriptionService::new(
            SqliteSubscriptionRepository::new(db_pool.clone()),
            MangaDexClient::from_config(&config),
        );
        let conversation_service =
            ConversationService::new(SqliteConversationRepository::new(db_pool));

        Ok(Self {
            subscription_service: Arc::new(subscription_service),
            conversation_service: Arc::new(conversation_service),
            config,
            data_dir,
        })
    }
}
