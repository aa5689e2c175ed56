//! Persistence layer — append-only SQLite log of accepted listings.

pub mod libsql_backend;

pub use libsql_backend::LibSqlStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DatabaseError;

/// A persisted accepted listing. Never mutated, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    /// Row id, assigned by SQLite AUTOINCREMENT — unique and monotonic.
    pub id: i64,
    /// Channel the posting arrived from.
    pub channel: String,
    /// HTML-formatted listing body.
    pub message: String,
    /// Phone number, handle, or link. May be empty.
    pub phone: String,
    /// Server-assigned insertion timestamp.
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic storage for accepted listings.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a listing. Returns the assigned row id.
    async fn append(
        &self,
        channel: &str,
        message: &str,
        phone: &str,
    ) -> Result<i64, DatabaseError>;

    /// All stored listings, newest first.
    async fn list_all(&self) -> Result<Vec<StoredMessage>, DatabaseError>;

    /// Number of stored listings.
    async fn count(&self) -> Result<u64, DatabaseError>;
}
