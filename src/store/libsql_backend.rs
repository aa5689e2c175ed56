//! libSQL backend for the message store. Local file or in-memory.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::{MessageStore, StoredMessage};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat TEXT NOT NULL,
        content TEXT NOT NULL,
        phone TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat);
";

const MESSAGE_COLUMNS: &str = "id, chat, content, phone, created_at";

/// libSQL message store.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<libsql::Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and apply the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for LibSqlStore {
    async fn append(
        &self,
        channel: &str,
        message: &str,
        phone: &str,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO messages (chat, content, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![channel, message, phone, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append: {e}")))?;

        let id = self.conn.last_insert_rowid();
        debug!(id, channel, "Listing inserted into DB");
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<StoredMessage>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY id DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_all: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let msg =
                row_to_message(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
            messages.push(msg);
        }
        Ok(messages)
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM messages", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count: {e}"))),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string written by `append`.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn row_to_message(row: &libsql::Row) -> Result<StoredMessage, libsql::Error> {
    let created_str: String = row.get(4)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        channel: row.get(1)?,
        message: row.get(2)?,
        phone: row.get(3)?,
        created_at: parse_datetime(&created_str),
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_assigns_monotonic_ids() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let first = store
            .append("@jobs", "Нужен курьер по Минску", "+375291234567")
            .await
            .unwrap();
        let second = store.append("@jobs", "Ищем повара", "").await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.append("@a", "первое", "").await.unwrap();
        store.append("@b", "второе", "").await.unwrap();
        store.append("@c", "третье", "+375291234567").await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].message, "третье");
        assert_eq!(all[0].phone, "+375291234567");
        assert_eq!(all[2].message, "первое");
        assert!(all[0].id > all[1].id && all[1].id > all[2].id);
        assert!(all[0].created_at >= all[2].created_at);
    }

    #[tokio::test]
    async fn count_tracks_appends() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.append("@jobs", "вакансия", "").await.unwrap();
        store.append("@jobs", "ещё одна", "").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("relay.db");

        {
            let store = LibSqlStore::new_local(&db_path).await.unwrap();
            store
                .append("@jobs", "Сохранится после перезапуска", "@ivan_hr")
                .await
                .unwrap();
        }

        let reopened = LibSqlStore::new_local(&db_path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all[0].channel, "@jobs");
        assert_eq!(all[0].phone, "@ivan_hr");
    }

    #[tokio::test]
    async fn new_local_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("relay.db");
        let _store = LibSqlStore::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.init_schema().await.unwrap();
    }
}
