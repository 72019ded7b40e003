//! Conversation persistence.
//!
//! SQLite-backed storage for conversations and their messages.  Messages are
//! ordered by insertion; assistant tool-call batches and tool results keep
//! their linkage through the `tool_calls` / `tool_call_id` columns so a
//! conversation can be replayed into a loop context.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A persistent conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier (UUID v7).
    pub id: String,
    /// Model used for this conversation.
    pub model: String,
    /// Unix timestamp when the conversation was created.
    pub created_at: i64,
    /// Unix timestamp when the conversation was last updated.
    pub updated_at: i64,
}

/// A single stored message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Auto-incrementing row ID — also the insertion order.
    pub id: i64,
    /// The conversation this message belongs to.
    pub conversation_id: String,
    /// Message role: `system`, `user`, `assistant`, or `tool`.
    pub role: String,
    /// Text content.  `NULL` for assistant messages that only carry tool
    /// calls.
    pub content: Option<String>,
    /// JSON-serialized tool-call batch (assistant messages only).
    pub tool_calls: Option<String>,
    /// Tool call ID this message answers (tool messages only).
    pub tool_call_id: Option<String>,
    /// Unix timestamp when the message was created.
    pub created_at: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  ConversationStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD operations on conversations and their messages.
#[derive(Clone)]
pub struct ConversationStore {
    db: Database,
}

impl ConversationStore {
    /// Create a new store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new conversation for the given model.
    #[instrument(skip(self))]
    pub async fn create(&self, model: &str) -> StoreResult<Conversation> {
        let id = Uuid::now_v7().to_string();
        let model = model.to_string();
        let now = Utc::now().timestamp();

        let conversation = Conversation {
            id: id.clone(),
            model: model.clone(),
            created_at: now,
            updated_at: now,
        };

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (id, model, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?3)",
                    rusqlite::params![id, model, now],
                )?;
                Ok(())
            })
            .await?;

        debug!(conversation_id = %conversation.id, "conversation created");
        Ok(conversation)
    }

    /// Fetch a single conversation by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Conversation> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, model, created_at, updated_at \
                     FROM conversations WHERE id = ?1",
                    rusqlite::params![id],
                    |row| {
                        Ok(Conversation {
                            id: row.get(0)?,
                            model: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    },
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                        entity: "conversation",
                        id: id.clone(),
                    },
                    other => StoreError::Sqlite(other),
                })
            })
            .await
    }

    /// List conversations ordered by most recently updated, with pagination.
    #[instrument(skip(self))]
    pub async fn list(&self, limit: u32, offset: u32) -> StoreResult<Vec<Conversation>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, model, created_at, updated_at \
                     FROM conversations ORDER BY updated_at DESC, id DESC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![limit, offset], |row| {
                        Ok(Conversation {
                            id: row.get(0)?,
                            model: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Delete a conversation and all its messages atomically.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM messages WHERE conversation_id = ?1",
                    rusqlite::params![id],
                )?;
                let deleted = tx.execute(
                    "DELETE FROM conversations WHERE id = ?1",
                    rusqlite::params![id],
                )?;
                if deleted == 0 {
                    // Rolls back on drop.
                    return Err(StoreError::NotFound {
                        entity: "conversation",
                        id,
                    });
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    /// Append a message and bump the conversation's `updated_at`.
    ///
    /// Returns the new message's row ID.
    #[instrument(skip(self, content, tool_calls, tool_call_id))]
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: Option<&str>,
        tool_calls: Option<&str>,
        tool_call_id: Option<&str>,
    ) -> StoreResult<i64> {
        let conversation_id = conversation_id.to_string();
        let role = role.to_string();
        let content = content.map(str::to_string);
        let tool_calls = tool_calls.map(str::to_string);
        let tool_call_id = tool_call_id.map(str::to_string);
        let now = Utc::now().timestamp();

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO messages (conversation_id, role, content, tool_calls, tool_call_id, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![conversation_id, role, content, tool_calls, tool_call_id, now],
                )?;
                let msg_id = conn.last_insert_rowid();

                conn.execute(
                    "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                    rusqlite::params![conversation_id, now],
                )?;

                Ok(msg_id)
            })
            .await
    }

    /// Get all messages for a conversation in insertion order.
    #[instrument(skip(self))]
    pub async fn messages(&self, conversation_id: &str) -> StoreResult<Vec<StoredMessage>> {
        let conversation_id = conversation_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, conversation_id, role, content, tool_calls, tool_call_id, created_at \
                     FROM messages WHERE conversation_id = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![conversation_id], |row| {
                        Ok(StoredMessage {
                            id: row.get(0)?,
                            conversation_id: row.get(1)?,
                            role: row.get(2)?,
                            content: row.get(3)?,
                            tool_calls: row.get(4)?,
                            tool_call_id: row.get(5)?,
                            created_at: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
