//! SQLite Storage Implementation
//!
//! Provides persistent storage using SQLite with WAL mode for crash safety.

use super::{Storage, StoredValue};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// SQLite-based key/value storage
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage at the given path
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ClientError::Database(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path)?;

            // Enable WAL mode for better concurrency and crash safety
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;

            // Run schema migrations
            migrate(&conn)?;

            Ok(conn)
        })
        .await
        .map_err(|e| ClientError::Database(format!("Failed to initialize database: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory SQLite database (for testing)
    pub async fn in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open_in_memory()?;
            migrate(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| {
            ClientError::Database(format!("Failed to create in-memory database: {}", e))
        })??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection off the async runtime
    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| ClientError::Database(format!("Failed to {}: {}", op, e)))?
    }
}

/// Current schema version; bump when adding migrations
const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Database schema v1
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Run schema migrations to bring the database up to `CURRENT_SCHEMA_VERSION`.
///
/// Uses SQLite's `PRAGMA user_version` to track the current version; calling
/// it on an already-current database is a no-op.
fn migrate(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    debug_assert_eq!(
        conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))
            .unwrap_or_default(),
        CURRENT_SCHEMA_VERSION
    );

    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn load(&self, key: &str) -> Result<Option<StoredValue>> {
        let key = key.to_string();
        self.with_conn("load value", move |conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT value, updated_at FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(value, updated_at)| {
                let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        ClientError::Database(format!("Bad timestamp for {}: {}", key, e))
                    })?;
                Ok::<_, ClientError>(StoredValue { value, updated_at })
            })
            .transpose()
        })
        .await
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_conn("save value", move |conn| {
            conn.execute(
                r#"
                INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn("delete value", move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.with_conn("list keys", |conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(keys)
        })
        .await
    }

    async fn health_check(&self) -> Result<()> {
        self.with_conn("check health", |conn| {
            let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            if result == "ok" {
                Ok(())
            } else {
                Err(ClientError::Database(format!(
                    "Integrity check failed: {}",
                    result
                )))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_storage_basic() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        storage.save("cache:playlist", "https://a.example.com").await.unwrap();
        let loaded = storage.load("cache:playlist").await.unwrap().unwrap();
        assert_eq!(loaded.value, "https://a.example.com");

        storage.save("cache:playlist", "https://b.example.com").await.unwrap();
        let loaded = storage.load("cache:playlist").await.unwrap().unwrap();
        assert_eq!(loaded.value, "https://b.example.com");

        storage.delete("cache:playlist").await.unwrap();
        assert!(storage.load("cache:playlist").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_keys() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.save("cache:search", "x").await.unwrap();
        storage.save("cache:album", "y").await.unwrap();
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["cache:album".to_string(), "cache:search".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("endpoints.db");

        {
            let storage = SqliteStorage::new(&path).await.unwrap();
            storage.save("cache:lyrics", "https://a.example.com").await.unwrap();
        }

        let storage = SqliteStorage::new(&path).await.unwrap();
        let loaded = storage.load("cache:lyrics").await.unwrap().unwrap();
        assert_eq!(loaded.value, "https://a.example.com");
    }

    #[tokio::test]
    async fn test_sqlite_corrupt_timestamp_is_isolated() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.save("cache:search", "https://a.example.com").await.unwrap();
        {
            let conn = storage.conn.lock().await;
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES ('cache:lyrics', 'x', 'garbage')",
                [],
            )
            .unwrap();
        }

        assert!(storage.load("cache:lyrics").await.is_err());
        assert!(storage.load("cache:search").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_health_check() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_versioning() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let conn = storage.conn.lock().await;
        let version: u32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0)).unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);

        // Running migrate again should be idempotent (no-op)
        migrate(&conn).unwrap();
        let version2: u32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0)).unwrap();
        assert_eq!(version2, CURRENT_SCHEMA_VERSION);
    }
}
