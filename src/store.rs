//! Durable conversation history on SQLite.
//!
//! One row per message, partitioned by `user_id`. Sessions write disjoint
//! keys, so no cross-session locking is needed.

use crate::conversation::Message;
use crate::error::EngineError;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

/// A persisted message row, as stored.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// Durable-history collaborator contract.
pub trait HistoryStore {
    fn append(&self, user_id: &str, role: &str, content: &str) -> Result<(), EngineError>;

    fn append_many(&self, user_id: &str, messages: &[Message]) -> Result<(), EngineError> {
        for message in messages {
            self.append(user_id, message.role.as_str(), &message.content)?;
        }
        Ok(())
    }

    /// All rows for a user, ordered by id ascending.
    fn query(&self, user_id: &str) -> Result<Vec<StoredMessage>, EngineError>;

    /// Delete one user's rows; returns the count removed.
    fn delete(&self, user_id: &str) -> Result<usize, EngineError>;

    /// Delete every row; returns the count removed.
    fn delete_all(&self) -> Result<usize, EngineError>;

    fn distinct_user_count(&self) -> Result<usize, EngineError>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    /// In-memory database, handy for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }
}

impl HistoryStore for SqliteStore {
    fn append(&self, user_id: &str, role: &str, content: &str) -> Result<(), EngineError> {
        self.conn.execute(
            "INSERT INTO messages (user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, role, content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn query(&self, user_id: &str) -> Result<Vec<StoredMessage>, EngineError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, role, content, created_at FROM messages \
             WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                user_id: row.get(1)?,
                role: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn delete(&self, user_id: &str) -> Result<usize, EngineError> {
        let count = self
            .conn
            .execute("DELETE FROM messages WHERE user_id = ?1", params![user_id])?;
        Ok(count)
    }

    fn delete_all(&self) -> Result<usize, EngineError> {
        let count = self.conn.execute("DELETE FROM messages", [])?;
        Ok(count)
    }

    fn distinct_user_count(&self) -> Result<usize, EngineError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(DISTINCT user_id) FROM messages", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }
}
