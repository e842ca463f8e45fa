//! Remote document store abstraction.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StoreError;
use crate::identity::UserId;
use crate::journey::JourneyState;

/// A snapshot: the whole document, or `None` when it does not exist.
pub type Snapshot = Option<JourneyState>;

/// Live stream of snapshots. The current value is delivered first, then one
/// item per change. Decode failures arrive as `Err` items without ending the
/// stream.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, StoreError>>;

/// Location of a user's journey document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// `artifacts/{app_id}/users/{uid}/data/current`
    pub fn for_user(app_id: &str, user: &UserId) -> Self {
        Self(format!("artifacts/{app_id}/users/{user}/data/current"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend-agnostic document store: one whole document per path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Subscribe to live snapshots of one document.
    async fn subscribe(&self, path: &DocumentPath) -> Result<SnapshotStream, StoreError>;

    /// Replace the whole document, creating it if needed.
    async fn upsert(&self, path: &DocumentPath, document: &JourneyState)
    -> Result<(), StoreError>;

    /// One-off read.
    async fn get(&self, path: &DocumentPath) -> Result<Snapshot, StoreError>;
}

/// Decode a raw JSON body into a snapshot.
pub(crate) fn decode(raw: Option<serde_json::Value>) -> Result<Snapshot, StoreError> {
    raw.map(serde_json::from_value::<JourneyState>)
        .transpose()
        .map_err(StoreError::from)
}
