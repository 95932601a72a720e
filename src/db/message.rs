//! Message repository
//!
//! Messages are append-only. Every read returns them oldest-first, ordered by
//! creation time with insertion order breaking ties.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DbPool, format_timestamp, parse_timestamp};
use crate::{Error, Result};

/// A persisted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Storage and wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(Error::Store(format!("unknown message role: {other}"))),
        }
    }
}

impl Message {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: role.parse().map_err(|e: Error| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    e.to_string().into(),
                )
            })?,
            content: row.get(3)?,
            created_at: parse_timestamp(&row.get::<_, String>(4)?, 4)?,
        })
    }
}

/// Message repository
#[derive(Clone)]
pub struct MessageRepo {
    pool: DbPool,
}

impl MessageRepo {
    /// Create a new message repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a message to a conversation, stamped with the current time
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(&self, conversation_id: &str, role: MessageRole, content: &str) -> Result<Message> {
        self.insert_at(conversation_id, role, content, Utc::now())
    }

    /// Append a message with an explicit creation time (imports, fixtures)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert_at(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message> {
        let conn = self.pool.get()?;

        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at,
        };

        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                &message.id,
                &message.conversation_id,
                role.as_str(),
                &message.content,
                format_timestamp(&message.created_at),
            ],
        )?;

        tracing::debug!(
            message_id = %message.id,
            conversation_id,
            role = %role,
            "stored message"
        );
        Ok(message)
    }

    /// All messages in a conversation, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let messages = stmt
            .query_map([conversation_id], Message::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(messages)
    }

    /// The `limit` most recent messages of one conversation, oldest first
    ///
    /// `exclude` skips a single message ID (typically the utterance just stored).
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent_in_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<Message>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages
             WHERE conversation_id = ?1 AND (?2 IS NULL OR id != ?2)
             ORDER BY created_at DESC, rowid DESC LIMIT ?3",
        )?;

        let mut messages = stmt
            .query_map(
                rusqlite::params![conversation_id, exclude, sql_limit(limit)],
                Message::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        messages.reverse();
        Ok(messages)
    }

    /// The `limit` most recent messages across every conversation owned by
    /// `user_id`, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<Message>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT m.id, m.conversation_id, m.role, m.content, m.created_at
             FROM messages m
             JOIN conversations c ON c.id = m.conversation_id
             WHERE c.user_id = ?1 AND (?2 IS NULL OR m.id != ?2)
             ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?3",
        )?;

        let mut messages = stmt
            .query_map(
                rusqlite::params![user_id, exclude, sql_limit(limit)],
                Message::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        messages.reverse();
        Ok(messages)
    }

    /// Number of messages stored in a conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_in_conversation(&self, conversation_id: &str) -> Result<usize> {
        let conn = self.pool.get()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            [conversation_id],
            |row| row.get(0),
        )?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
