//! SQLite cache of fetched `get_transaction` bodies, keyed by request hash.

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Cached history responses. Key = SHA-256 of the normalized request body, so
/// a lookup hits regardless of which provider originally served it. The
/// serving provider's name is kept alongside the body for inspection.
pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    /// Open or create the cache at `path`. Creates parent dirs if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tx_responses (
                key TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                body TEXT NOT NULL,
                fetched_utc INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Content-hash key from the normalized request body (JSON string).
    pub fn key_for(request_json: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request_json.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Cached response body for `key`, or None on a miss.
    pub fn get_response(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let mut stmt = conn.prepare("SELECT body FROM tx_responses WHERE key = ?1")?;
        let row = stmt
            .query_row([key], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(row)
    }

    /// Insert or replace the response body for `key`.
    pub fn put_response(&self, key: &str, provider: &str, body: &str) -> Result<(), CacheError> {
        let fetched = time::OffsetDateTime::now_utc().unix_timestamp();
        let conn = self
            .conn
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO tx_responses (key, provider, body, fetched_utc) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![key, provider, body, fetched],
        )?;
        Ok(())
    }
}
