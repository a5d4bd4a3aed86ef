//! Persistent store trait and implementations.
//!
//! This module defines the [`PersistentStore`] trait: a durable key/value
//! store of JSON documents addressed by [`DocPath`]. Every other component
//! talks to persistence through it, which keeps them independent of the
//! backend and lets tests substitute an in-memory double.

mod memory;
mod sqlite;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;
use crate::DocPath;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Unified interface for document stores.
///
/// Writes are whole-document and atomic per path; a store serialises its own
/// writes (last write wins). There are no multi-document transactions.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelf_store::{DocPath, PersistentStore, error::Result};
///
/// async fn bump(store: &dyn PersistentStore) -> Result<u64> {
///     let path = DocPath::root("Counters")?.child("visits")?;
///     let current = store.get(&path).await?.and_then(|v| v.as_u64()).unwrap_or(0);
///     store.put(&path, &json!(current + 1)).await?;
///     Ok(current + 1)
/// }
/// ```
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Name of the store, for logging only.
    fn name(&self) -> &str;

    /// Read the document at `path`, if there is one.
    async fn get(&self, path: &DocPath) -> Result<Option<Value>>;

    /// Create or replace the document at `path`.
    async fn put(&self, path: &DocPath, document: &Value) -> Result<()>;

    /// Delete the document at `path`. Returns `false` if there was nothing to
    /// delete. Descendants of `path` are left alone.
    async fn delete(&self, path: &DocPath) -> Result<bool>;

    /// List every document strictly below `prefix`, at any depth.
    ///
    /// Passing a namespace root lists the whole namespace. Order is by
    /// encoded path, which callers should not rely on.
    async fn list(&self, prefix: &DocPath) -> Result<Vec<(DocPath, Value)>>;

    /// Delete every document in `namespace`, returning how many were removed.
    async fn clear(&self, namespace: &str) -> Result<u64>;
}
