//! libSQL document store: journey documents persisted in a local database.
//!
//! libSQL has no change feed, so live snapshots are fanned out in-process:
//! each subscribed path gets a `watch` channel seeded from the table, and
//! every successful `upsert` through this store republishes the new body.
//!
//! The same database also keeps this installation's anonymous device id.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::journey::JourneyState;

use super::document::{DocumentPath, DocumentStore, Snapshot, SnapshotStream, decode};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS journey_documents (
        path TEXT PRIMARY KEY,
        body TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS device_identity (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        device_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
"#;

type Slot = Arc<watch::Sender<Option<serde_json::Value>>>;

pub struct LibSqlDocumentStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    watchers: Mutex<HashMap<DocumentPath, Slot>>,
}

impl LibSqlDocumentStore {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Document store opened");
        Ok(store)
    }

    /// In-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| StoreError::Query(format!("init schema: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            watchers: Mutex::new(HashMap::new()),
        })
    }

    /// Raw stored body. A body that is not JSON comes back as a JSON
    /// string so decoding reports it instead of the read failing.
    async fn read_raw(&self, path: &DocumentPath) -> Result<Option<serde_json::Value>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT body FROM journey_documents WHERE path = ?1",
                params![path.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("read document: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let body: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("read document body: {e}")))?;
                match serde_json::from_str(&body) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        warn!(path = %path, error = %e, "Stored document is not valid JSON");
                        Ok(Some(serde_json::Value::String(body)))
                    }
                }
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("read document: {e}"))),
        }
    }

    /// Stable anonymous id for this installation, created on first use.
    pub async fn device_id(&self) -> Result<String, StoreError> {
        if let Some(id) = self.read_device_id().await? {
            return Ok(id);
        }

        let fresh = uuid::Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT OR IGNORE INTO device_identity (id, device_id, created_at) VALUES (1, ?1, ?2)",
                params![fresh, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("store device id: {e}")))?;

        // Another writer may have won the insert
        let id = self
            .read_device_id()
            .await?
            .ok_or_else(|| StoreError::Query("device id missing after insert".to_string()))?;
        info!(device_id = %id, "Device id created");
        Ok(id)
    }

    async fn read_device_id(&self) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT device_id FROM device_identity WHERE id = 1", ())
            .await
            .map_err(|e| StoreError::Query(format!("read device id: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => row
                .get::<String>(0)
                .map(Some)
                .map_err(|e| StoreError::Query(format!("read device id: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("read device id: {e}"))),
        }
    }

    fn lock_watchers(&self) -> MutexGuard<'_, HashMap<DocumentPath, Slot>> {
        self.watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for LibSqlDocumentStore {
    fn name(&self) -> &str {
        "libsql"
    }

    async fn subscribe(&self, path: &DocumentPath) -> Result<SnapshotStream, StoreError> {
        let seed = self.read_raw(path).await?;
        let rx = {
            let mut watchers = self.lock_watchers();
            match watchers.get(path) {
                Some(slot) => slot.subscribe(),
                None => {
                    let (tx, rx) = watch::channel(seed);
                    watchers.insert(path.clone(), Arc::new(tx));
                    rx
                }
            }
        };
        debug!(path = %path, "libSQL subscription opened");
        Ok(WatchStream::new(rx).map(decode).boxed())
    }

    async fn upsert(&self, path: &DocumentPath, document: &JourneyState) -> Result<(), StoreError> {
        let body = serde_json::to_value(document)?;
        let body_str = serde_json::to_string(&body)?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO journey_documents (path, body, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (path) DO UPDATE SET body = ?2, updated_at = ?3",
                params![path.as_str(), body_str, now],
            )
            .await
            .map_err(|e| StoreError::WriteRejected {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(slot) = self.lock_watchers().get(path) {
            slot.send_replace(Some(body));
        }
        Ok(())
    }

    async fn get(&self, path: &DocumentPath) -> Result<Snapshot, StoreError> {
        decode(self.read_raw(path).await?)
    }
}
