//! Remote persistence of the journey document.
//!
//! `DocumentStore` is the backend seam; `RemoteSync` runs one sign-in
//! session against it.

pub mod document;
pub mod libsql_store;
pub mod memory;
pub mod remote;

pub use document::{DocumentPath, DocumentStore, Snapshot, SnapshotStream};
pub use libsql_store::LibSqlDocumentStore;
pub use memory::MemoryDocumentStore;
pub use remote::RemoteSync;
