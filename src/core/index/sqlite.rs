//! SQLite index backend for persistent storage.
//!
//! Each logical collection is a table of JSON documents. The columns next
//! to the document exist only to index and order it. Every statement runs
//! on tokio's blocking pool.

use super::RecordIndex;
use crate::core::record::{Collection, ImageRecord, TrashRecord};
use crate::error::IndexError;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// SQLite-backed persistent index
///
/// Uses WAL (Write-Ahead Logging) mode so readers proceed while a write is
/// in progress.
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteIndex {
    /// Open or create an index database at the given path
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| IndexError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(query_failed)?;

        Self::create_schema(&conn)?;

        tracing::debug!(path = %path.display(), "record index opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        })
    }

    /// Open a private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory().map_err(|e| IndexError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::create_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn create_schema(conn: &Connection) -> Result<(), IndexError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                sha256 TEXT NOT NULL,
                added_at INTEGER NOT NULL,
                doc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_images_sha256 ON images(sha256);
            CREATE INDEX IF NOT EXISTS idx_images_added_at ON images(added_at);

            CREATE TABLE IF NOT EXISTS trash (
                id TEXT PRIMARY KEY,
                original_id TEXT NOT NULL,
                deleted_at INTEGER NOT NULL,
                doc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trash_deleted_at ON trash(deleted_at);

            CREATE TABLE IF NOT EXISTS collections (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                doc TEXT NOT NULL
            );",
        )
        .map_err(query_failed)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, IndexError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &Path) -> Result<T, IndexError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| IndexError::Corrupted { path: path.clone() })?;
            f(&guard, &path)
        })
        .await
        .map_err(|e| IndexError::QueryFailed(format!("index task failed: {}", e)))?
    }

    async fn get_doc<T>(&self, sql: &'static str, id: &str) -> Result<Option<T>, IndexError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let id = id.to_string();
        self.with_conn(move |conn, path| {
            let doc: Option<String> = conn
                .query_row(sql, [id.as_str()], |row| row.get(0))
                .optional()
                .map_err(query_failed)?;

            doc.map(|doc| decode(path, &doc)).transpose()
        })
        .await
    }

    async fn query_docs<T>(&self, sql: &'static str, values: Vec<Value>) -> Result<Vec<T>, IndexError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.with_conn(move |conn, path| {
            let mut stmt = conn.prepare(sql).map_err(query_failed)?;

            let docs = stmt
                .query_map(params_from_iter(values), |row| row.get::<_, String>(0))
                .map_err(query_failed)?
                .collect::<Result<Vec<String>, _>>()
                .map_err(query_failed)?;

            docs.iter().map(|doc| decode(path, doc)).collect()
        })
        .await
    }

    async fn execute(&self, sql: &'static str, values: Vec<Value>) -> Result<(), IndexError> {
        self.with_conn(move |conn, _| {
            conn.execute(sql, params_from_iter(values)).map_err(query_failed)?;
            Ok(())
        })
        .await
    }
}

fn query_failed(e: rusqlite::Error) -> IndexError {
    IndexError::QueryFailed(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<String, IndexError> {
    serde_json::to_string(value).map_err(|e| IndexError::SerializationFailed(e.to_string()))
}

fn decode<T: DeserializeOwned>(path: &Path, doc: &str) -> Result<T, IndexError> {
    serde_json::from_str(doc).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "unreadable index document");
        IndexError::Corrupted {
            path: path.to_path_buf(),
        }
    })
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

#[async_trait]
impl RecordIndex for SqliteIndex {
    async fn put(&self, record: &ImageRecord) -> Result<(), IndexError> {
        let doc = encode(record)?;
        self.execute(
            "INSERT OR REPLACE INTO images (id, sha256, added_at, doc) VALUES (?, ?, ?, ?)",
            vec![
                text(&record.id),
                text(&record.sha256),
                Value::Integer(record.internal_added_timestamp.timestamp_millis()),
                Value::Text(doc),
            ],
        )
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>, IndexError> {
        self.get_doc("SELECT doc FROM images WHERE id = ?", id).await
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.execute("DELETE FROM images WHERE id = ?", vec![text(id)]).await
    }

    async fn query_all(&self) -> Result<Vec<ImageRecord>, IndexError> {
        self.query_docs("SELECT doc FROM images ORDER BY added_at DESC, id ASC", Vec::new())
            .await
    }

    async fn find_by_sha256(&self, sha256: &str) -> Result<Vec<ImageRecord>, IndexError> {
        self.query_docs(
            "SELECT doc FROM images WHERE sha256 = ? ORDER BY added_at DESC, id ASC",
            vec![text(sha256)],
        )
        .await
    }

    async fn put_trashed(&self, record: &TrashRecord) -> Result<(), IndexError> {
        let doc = encode(record)?;
        self.execute(
            "INSERT OR REPLACE INTO trash (id, original_id, deleted_at, doc) VALUES (?, ?, ?, ?)",
            vec![
                text(&record.id),
                text(&record.original_id),
                Value::Integer(record.deleted_at.timestamp_millis()),
                Value::Text(doc),
            ],
        )
        .await
    }

    async fn get_trashed(&self, id: &str) -> Result<Option<TrashRecord>, IndexError> {
        self.get_doc("SELECT doc FROM trash WHERE id = ?", id).await
    }

    async fn delete_trashed(&self, id: &str) -> Result<(), IndexError> {
        self.execute("DELETE FROM trash WHERE id = ?", vec![text(id)]).await
    }

    async fn query_trashed(&self) -> Result<Vec<TrashRecord>, IndexError> {
        self.query_docs("SELECT doc FROM trash ORDER BY deleted_at DESC, id ASC", Vec::new())
            .await
    }

    async fn put_collection(&self, collection: &Collection) -> Result<(), IndexError> {
        let doc = encode(collection)?;
        self.execute(
            "INSERT OR REPLACE INTO collections (id, created_at, doc) VALUES (?, ?, ?)",
            vec![
                text(&collection.id),
                Value::Integer(collection.created_at.timestamp_millis()),
                Value::Text(doc),
            ],
        )
        .await
    }

    async fn get_collection(&self, id: &str) -> Result<Option<Collection>, IndexError> {
        self.get_doc("SELECT doc FROM collections WHERE id = ?", id).await
    }

    async fn delete_collection(&self, id: &str) -> Result<(), IndexError> {
        self.execute("DELETE FROM collections WHERE id = ?", vec![text(id)]).await
    }

    async fn query_collections(&self) -> Result<Vec<Collection>, IndexError> {
        self.query_docs(
            "SELECT doc FROM collections ORDER BY created_at ASC, id ASC",
            Vec::new(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::fixtures::record;
    use chrono::Utc;

    #[tokio::test]
    async fn record_survives_a_round_trip() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let mut rec = record("a", "sha-a");
        rec.tags = vec!["cats".to_string()];
        rec.exif_metadata_map.insert("Make".to_string(), "Canon".to_string());

        index.put(&rec).await.unwrap();
        assert_eq!(index.get("a").await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn find_by_sha256_uses_the_column() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index.put(&record("a", "same")).await.unwrap();
        index.put(&record("b", "same")).await.unwrap();
        index.put(&record("c", "other")).await.unwrap();

        assert_eq!(index.find_by_sha256("same").await.unwrap().len(), 2);
        assert!(index.find_by_sha256("none").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_replaces_existing_document() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let mut rec = record("a", "sha");
        index.put(&rec).await.unwrap();

        rec.description = "edited".to_string();
        index.put(&rec).await.unwrap();

        let all = index.query_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "edited");
    }

    #[tokio::test]
    async fn corrupt_document_is_reported() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index
            .execute(
                "INSERT INTO images (id, sha256, added_at, doc) VALUES (?, ?, ?, ?)",
                vec![text("bad"), text("x"), Value::Integer(0), text("{not json")],
            )
            .await
            .unwrap();

        assert!(matches!(index.get("bad").await, Err(IndexError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn trash_round_trip() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let trashed = TrashRecord::from_active(record("a", "1"), "t-1".to_string(), Utc::now());

        index.put_trashed(&trashed).await.unwrap();
        assert_eq!(index.get_trashed("t-1").await.unwrap(), Some(trashed));

        index.delete_trashed("t-1").await.unwrap();
        assert!(index.query_trashed().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writers_share_the_connection() {
        let index = Arc::new(SqliteIndex::open_in_memory().unwrap());

        let writes = (0..16).map(|i| {
            let index = Arc::clone(&index);
            tokio::spawn(async move { index.put(&record(&format!("r{}", i), "sha")).await })
        });
        for outcome in futures_util::future::join_all(writes).await {
            outcome.unwrap().unwrap();
        }

        assert_eq!(index.find_by_sha256("sha").await.unwrap().len(), 16);
    }
}
