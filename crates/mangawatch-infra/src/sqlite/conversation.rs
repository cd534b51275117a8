//! SQLite conversation context repository.

use chrono::Utc;
use mangawatch_core::repository::conversation::ConversationRepository;
use mangawatch_types::error::RepositoryError;
use mangawatch_types::subscription::Recipient;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl ConversationRepository for SqliteConversationRepository {
    async fn find_conversation(
        &self,
        recipient: &Recipient,
    ) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT command FROM conversation_contexts WHERE recipient = ?")
            .bind(recipient.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let command: String = row
                    .try_get("command")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(command))
            }
            None => Ok(None),
        }
    }

    async fn upsert_conversation(
        &self,
        recipient: &Recipient,
        command: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversation_contexts (recipient, command, created_at)
               VALUES (?, ?, ?)
               ON CONFLICT (recipient) DO UPDATE SET command = excluded.command, created_at = excluded.created_at"#,
        )
        .bind(recipient.as_str())
        .bind(command)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete_conversation(&self, recipient: &Recipient) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM conversation_contexts WHERE recipient = ?")
            .bind(recipient.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
