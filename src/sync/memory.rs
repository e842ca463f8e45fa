//! In-process document store.
//!
//! Each path owns a `watch` channel holding the raw JSON body, so
//! subscribers get the current document immediately and every later write.
//! Bodies are kept as raw JSON so tests can plant documents another client
//! wrote, including malformed ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::error::StoreError;
use crate::journey::JourneyState;

use super::document::{DocumentPath, DocumentStore, Snapshot, SnapshotStream, decode};

type Slot = Arc<watch::Sender<Option<serde_json::Value>>>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<DocumentPath, Slot>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `upsert` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `upsert` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Write a raw body as another client would, bypassing the counters.
    pub fn put_raw(&self, path: &DocumentPath, body: serde_json::Value) {
        self.slot(path).send_replace(Some(body));
    }

    /// Remove a document. Subscribers receive a "missing" snapshot.
    pub fn delete(&self, path: &DocumentPath) {
        self.slot(path).send_replace(None);
    }

    /// Current raw body, if any.
    pub fn raw(&self, path: &DocumentPath) -> Option<serde_json::Value> {
        self.lock_docs().get(path).and_then(|slot| slot.borrow().clone())
    }

    fn slot(&self, path: &DocumentPath) -> Slot {
        self.lock_docs()
            .entry(path.clone())
            .or_insert_with(|| Arc::new(watch::channel(None).0))
            .clone()
    }

    fn lock_docs(&self) -> MutexGuard<'_, HashMap<DocumentPath, Slot>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn subscribe(&self, path: &DocumentPath) -> Result<SnapshotStream, StoreError> {
        let rx = self.slot(path).subscribe();
        debug!(path = %path, "Memory store subscription opened");
        Ok(WatchStream::new(rx).map(decode).boxed())
    }

    async fn upsert(&self, path: &DocumentPath, document: &JourneyState) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected {
                path: path.to_string(),
                reason: "writes disabled".to_string(),
            });
        }
        let body = serde_json::to_value(document)?;
        self.slot(path).send_replace(Some(body));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, path: &DocumentPath) -> Result<Snapshot, StoreError> {
        decode(self.raw(path))
    }
}
