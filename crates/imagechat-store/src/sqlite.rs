//! Embedded SQLite persistence for users, query history, and image
//! feedback.
//!
//! One connection behind a mutex serves all three store traits. The API
//! surface is append-only: nothing here updates or deletes a historical
//! record. SQLite's own transactional guarantees cover concurrent appends
//! from multiple sessions.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use imagechat_core::traits::{FeedbackStore, HistoryStore, UserStore};
use imagechat_core::types::{FeedbackRecord, HistoryEntry, Rating, User, UserId};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database file, creating parent directories and
    /// the schema as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS user_queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                query TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS image_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                query TEXT NOT NULL,
                image_url TEXT NOT NULL,
                rating INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_image_feedback_doc_id
                ON image_feedback(doc_id);",
        )
        .context("Failed to initialize schema")?;
        Ok(())
    }

    /// SHA-256 hex digest. The password column holds exactly this
    /// 64-character form, never the plain text.
    fn hash_password(password: &str) -> String {
        format!("{:x}", Sha256::digest(password.as_bytes()))
    }
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl UserStore for SqliteStore {
    fn create_user(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (name, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                name,
                email,
                Self::hash_password(password),
                Utc::now().to_rfc3339()
            ],
        )
        .context("Failed to insert user")?;
        Ok(User {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, name, email FROM users WHERE email = ?1 AND password = ?2",
                params![email, Self::hash_password(password)],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to verify credentials")?;
        Ok(user)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, name, email FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to look up user")?;
        Ok(user)
    }
}

impl HistoryStore for SqliteStore {
    fn append(
        &self,
        user_id: UserId,
        query_text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_queries (user_id, query, timestamp) VALUES (?1, ?2, ?3)",
            params![user_id, query_text, timestamp.to_rfc3339()],
        )
        .context("Failed to append history entry")?;
        Ok(())
    }

    fn list_for_user(&self, user_id: UserId) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, query, timestamp FROM user_queries
             WHERE user_id = ?1 ORDER BY timestamp DESC, id DESC",
        )?;
        let entries = stmt
            .query_map(params![user_id], |row| {
                let raw: String = row.get(2)?;
                Ok(HistoryEntry {
                    user_id: row.get(0)?,
                    query_text: row.get(1)?,
                    timestamp: parse_timestamp(2, &raw)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list history")?;
        Ok(entries)
    }
}

impl FeedbackStore for SqliteStore {
    fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO image_feedback (doc_id, query, image_url, rating, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.document_id,
                record.query_text,
                record.image_reference,
                record.rating.value(),
                record.recorded_at.to_rfc3339()
            ],
        )
        .context("Failed to append feedback")?;
        Ok(())
    }

    fn query_by_document(&self, document_id: &str) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT doc_id, query, image_url, rating, created_at FROM image_feedback
             WHERE doc_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![document_id], |row| {
                let raw_rating: i64 = row.get(3)?;
                let rating = Rating::try_from(raw_rating).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Integer,
                        Box::new(e),
                    )
                })?;
                let raw_ts: String = row.get(4)?;
                Ok(FeedbackRecord {
                    document_id: row.get(0)?,
                    query_text: row.get(1)?,
                    image_reference: row.get(2)?,
                    rating,
                    recorded_at: parse_timestamp(4, &raw_ts)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query feedback")?;
        Ok(records)
    }
}
