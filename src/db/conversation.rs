//! Conversation repository

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use super::{DbPool, format_timestamp, parse_timestamp};
use crate::{Error, Result};

/// Title given to conversations created without one
pub const DEFAULT_TITLE: &str = "New Journal Entry";

/// A user-owned journaling thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            created_at: parse_timestamp(&row.get::<_, String>(3)?, 3)?,
        })
    }
}

/// Conversation repository
#[derive(Clone)]
pub struct ConversationRepo {
    pool: DbPool,
}

impl ConversationRepo {
    /// Create a new conversation repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a conversation owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self, user_id: &str, title: Option<&str>) -> Result<Conversation> {
        let conn = self.pool.get()?;

        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_TITLE)
                .to_string(),
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO conversations (id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                &conversation.id,
                &conversation.user_id,
                &conversation.title,
                format_timestamp(&conversation.created_at),
            ],
        )?;

        tracing::debug!(conversation_id = %conversation.id, user_id, "created conversation");
        Ok(conversation)
    }

    /// Look up a conversation by ID regardless of owner
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.pool.get()?;

        let conversation = conn
            .query_row(
                "SELECT id, user_id, title, created_at FROM conversations WHERE id = ?1",
                [id],
                Conversation::from_row,
            )
            .optional()?;

        Ok(conversation)
    }

    /// Look up a conversation and verify that `user_id` owns it
    ///
    /// A missing conversation is reported the same way as a foreign one, so
    /// callers cannot probe for other users' conversation IDs.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the conversation does not exist or belongs to
    /// another user, or a store error if the lookup fails
    pub fn get_owned(&self, id: &str, user_id: &str) -> Result<Conversation> {
        match self.get(id)? {
            Some(conversation) if conversation.user_id == user_id => Ok(conversation),
            Some(_) => {
                tracing::warn!(conversation_id = id, user_id, "conversation owner mismatch");
                Err(Error::Unauthorized("invalid chat ID".to_string()))
            }
            None => {
                tracing::debug!(conversation_id = id, "conversation not found");
                Err(Error::Unauthorized("invalid chat ID".to_string()))
            }
        }
    }

    /// List a user's conversations, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, created_at FROM conversations
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;

        let conversations = stmt
            .query_map([user_id], Conversation::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conversations)
    }

    /// Rename a conversation owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank title, `Unauthorized` if the user does
    /// not own the conversation, or a store error
    pub fn rename(&self, id: &str, user_id: &str, title: &str) -> Result<Conversation> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("title cannot be empty".to_string()));
        }

        let mut conversation = self.get_owned(id, user_id)?;

        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE conversations SET title = ?1 WHERE id = ?2",
            [title, id],
        )?;

        conversation.title = title.to_string();
        Ok(conversation)
    }
}
