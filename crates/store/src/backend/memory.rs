//! In-memory document store for testing.
//!
//! Not gated behind `#[cfg(test)]` so that other crates can use it in their
//! tests.

use crate::DocPath;
use crate::PersistentStore;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

type Key = (String, String);

/// In-memory document store for testing.
///
/// Documents are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation.
///
/// Writes can be refused per path with [`deny_writes`](Self::deny_writes),
/// which is how tests simulate a store failing for one document while the
/// rest of the store keeps working.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelf_store::{DocPath, MemoryStore, PersistentStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::default();
/// let broken = DocPath::root("CachedManga")?.child("Sources")?.child("broken")?;
/// store.deny_writes(broken.clone()).await;
/// assert!(store.put(&broken.child("a")?, &json!({})).await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    name: String,
    documents: RwLock<BTreeMap<Key, Value>>,
    denied: RwLock<HashSet<DocPath>>,
}

impl MemoryStore {
    /// Change the name of the store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Refuse writes (and deletes) to `path` and everything below it.
    pub async fn deny_writes(&self, path: DocPath) {
        self.denied.write().await.insert(path);
    }

    /// Accept writes everywhere again.
    pub async fn allow_all_writes(&self) {
        self.denied.write().await.clear();
    }

    /// Number of documents currently held, across all namespaces.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn check_writable(&self, path: &DocPath) -> Result<()> {
        let denied = self.denied.read().await;
        if denied.iter().any(|d| d == path || d.is_ancestor_of(path)) {
            exn::bail!(ErrorKind::WriteDenied(path.to_string()));
        }
        Ok(())
    }

    fn key(path: &DocPath) -> Key {
        (path.namespace().to_string(), path.encoded())
    }
}
impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            documents: RwLock::new(BTreeMap::new()),
            denied: RwLock::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        Ok(self.documents.read().await.get(&Self::key(path)).cloned())
    }

    async fn put(&self, path: &DocPath, document: &Value) -> Result<()> {
        self.check_writable(path).await?;
        self.documents.write().await.insert(Self::key(path), document.clone());
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<bool> {
        self.check_writable(path).await?;
        Ok(self.documents.write().await.remove(&Self::key(path)).is_some())
    }

    async fn list(&self, prefix: &DocPath) -> Result<Vec<(DocPath, Value)>> {
        let descendants = prefix.descendant_prefix();
        // Snapshot under the read lock, decode after releasing it.
        let matching: Vec<(String, Value)> = {
            let guard = self.documents.read().await;
            guard
                .iter()
                .filter(|((namespace, path), _)| namespace == prefix.namespace() && path.starts_with(&descendants))
                .map(|((_, path), value)| (path.clone(), value.clone()))
                .collect()
        };
        matching
            .into_iter()
            .map(|(path, value)| -> Result<(DocPath, Value)> { Ok((DocPath::decode(prefix.namespace(), &path)?, value)) })
            .collect()
    }

    async fn clear(&self, namespace: &str) -> Result<u64> {
        let mut guard = self.documents.write().await;
        let before = guard.len();
        guard.retain(|(ns, _), _| ns != namespace);
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}
