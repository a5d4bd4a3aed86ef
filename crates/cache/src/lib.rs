//! Persistent metadata cache and library index.
//!
//! Both live in the shared document store, in separate namespaces:
//!
//! - `CachedManga` → `Sources/{source}/{item}` holds one [`CacheRecord`] per
//!   item ever fetched, library member or not. Records are only ever
//!   reconciled field by field ([`MangaCache::merge`]), never overwritten
//!   wholesale, so user-local state survives every refresh.
//! - `Library` → `Sources/{source}` holds the ids the user explicitly added
//!   from that source, whether the source takes part in background refresh,
//!   and when it was last bulk-refreshed.
//!
//! Removing an item from the library does not touch its cache record.

mod cache;
pub mod error;
mod library;
mod models;
mod record;

pub use crate::cache::MangaCache;
pub use crate::library::{LibraryIndex, SourceState};
pub use crate::record::CacheRecord;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use shelf_store::DocPath;

/// Path segment grouping per-source documents in both namespaces.
const SOURCES: &str = "Sources";

fn source_path(namespace: &str, source: impl AsRef<str>) -> Result<DocPath> {
    DocPath::root(namespace)
        .and_then(|root| root.child(SOURCES))
        .and_then(|sources| sources.child(source))
        .or_raise(|| ErrorKind::InvalidData("document path"))
}
