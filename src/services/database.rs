use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

/// SQLite-backed key-value table. Values are opaque strings (JSON in practice).
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create data directory: {}", parent.display())
                    })?;
                }
            }

            let conn = Connection::open(&path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            Self::from_connection(conn)
        })
        .await?
    }

    /// Create an in-memory database (used for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
        conn.lock().map_err(|_| anyhow!("Database connection poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = Self::lock(&self.conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let result: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(result)
        })
        .await?
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await?
    }

    /// Delete every key starting with `prefix`.
    pub async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let conn = self.conn.clone();
        let prefix = prefix.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let removed = conn.execute(
                "DELETE FROM kv_store WHERE substr(key, 1, length(?1)) = ?1",
                params![prefix],
            )?;
            Ok(removed)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_get_overwrite_remove() {
        let db = Database::new_in_memory().unwrap();
        db.set("finchat:settings", "{}").await.unwrap();
        db.set("finchat:settings", "{\"a\":1}").await.unwrap();
        assert_eq!(
            db.get("finchat:settings").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        db.remove("finchat:settings").await.unwrap();
        assert!(db.get("finchat:settings").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_prefix_matches_exactly() {
        let db = Database::new_in_memory().unwrap();
        db.set("finchat:messages:a", "[]").await.unwrap();
        db.set("finchat:messages:b", "[]").await.unwrap();
        db.set("finchat:conversations", "[]").await.unwrap();
        db.set("tmp_a", "1").await.unwrap();
        db.set("tmpXa", "1").await.unwrap();
        db.set("TMP_b", "1").await.unwrap();

        assert_eq!(db.remove_prefix("finchat:messages:").await.unwrap(), 2);
        assert!(db.get("finchat:messages:a").await.unwrap().is_none());
        assert!(db.get("finchat:conversations").await.unwrap().is_some());

        // Neither `_` nor case acts as a wildcard.
        assert_eq!(db.remove_prefix("tmp_").await.unwrap(), 1);
        assert!(db.get("tmpXa").await.unwrap().is_some());
        assert!(db.get("TMP_b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("finchat.db");
        {
            let db = Database::open(&path).await.unwrap();
            db.set("k", "v").await.unwrap();
        }
        let db = Database::open(&path).await.unwrap();
        assert_eq!(db.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
