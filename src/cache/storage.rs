//! SQLite implementation of the content store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{CacheKey, CacheLookup, CachedDocument, ContentStore};

/// SQLite-based content store.
pub struct SqliteContentStore {
  conn: Mutex<Connection>,
}

impl SqliteContentStore {
  /// Open (or create) the store at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Store that lives only as long as the process.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("newsrelay").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content_cache (
    tag_id TEXT NOT NULL,
    query TEXT NOT NULL,
    page INTEGER NOT NULL,
    content TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (tag_id, query, page)
);
"#;

fn validate_key(key: &CacheKey) -> Result<()> {
  if key.page == 0 {
    return Err(eyre!("Cache page numbers start at 1, got 0"));
  }
  Ok(())
}

impl ContentStore for SqliteContentStore {
  fn get(&self, key: &CacheKey) -> Result<CacheLookup> {
    validate_key(key)?;
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(String, String)> = conn
      .query_row(
        "SELECT content, cached_at FROM content_cache
         WHERE tag_id = ? AND query = ? AND page = ?",
        params![key.topic, key.query, key.page],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached content: {}", e))?;

    match row {
      Some((body, cached_at)) => Ok(CacheLookup::Hit(CachedDocument {
        body,
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(CacheLookup::Miss),
    }
  }

  fn put(&self, key: &CacheKey, body: &str) -> Result<()> {
    validate_key(key)?;
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO content_cache (tag_id, query, page, content, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![key.topic, key.query, key.page, body],
      )
      .map_err(|e| eyre!("Failed to store cached content: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM content_cache", [])
      .map_err(|e| eyre!("Failed to clear content cache: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
