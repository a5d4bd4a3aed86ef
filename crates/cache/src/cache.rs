use crate::error::{ErrorKind, Result};
use crate::models::RecordDoc;
use crate::{CacheRecord, SOURCES, source_path};
use exn::ResultExt;
use serde_json::{Value, json};
use shelf_models::{Manga, MangaId, SourceId};
use shelf_store::{DocPath, StoreHandle};
use std::collections::BTreeSet;
use time::UtcDateTime;
use tracing::{debug, instrument, warn};

/// Owner of the `CachedManga` namespace.
///
/// Cheap to clone; clones share the same store handle.
#[derive(Clone)]
pub struct MangaCache {
    store: StoreHandle,
    default_sources: Vec<SourceId>,
}
impl MangaCache {
    pub const NAMESPACE: &'static str = "CachedManga";

    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            default_sources: vec![],
        }
    }

    /// Sources that get an empty entry again after [`flush`](Self::flush).
    pub fn with_default_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SourceId>,
    {
        self.default_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    fn item_path(source: &SourceId, id: &MangaId) -> Result<DocPath> {
        source_path(Self::NAMESPACE, source)?
            .child(id)
            .or_raise(|| ErrorKind::InvalidData("document path"))
    }

    fn decode(value: Value) -> Result<CacheRecord> {
        let doc: RecordDoc = serde_json::from_value(value).or_raise(|| ErrorKind::InvalidData("cache record"))?;
        CacheRecord::try_from(doc)
    }

    #[instrument(level = "trace", skip_all, fields(source = %source, id = %id))]
    pub async fn get(&self, source: &SourceId, id: &MangaId) -> Result<Option<CacheRecord>> {
        let path = Self::item_path(source, id)?;
        let value = self.store.get(&path).await.or_raise(|| ErrorKind::Store)?;
        value.map(Self::decode).transpose()
    }

    /// [`get`](Self::get), except that a stored record which no longer decodes
    /// (written by a newer build, or damaged) is logged and treated as absent.
    /// Store failures still propagate.
    #[instrument(level = "trace", skip_all, fields(source = %source, id = %id))]
    pub async fn get_decodable(&self, source: &SourceId, id: &MangaId) -> Result<Option<CacheRecord>> {
        let path = Self::item_path(source, id)?;
        let Some(value) = self.store.get(&path).await.or_raise(|| ErrorKind::Store)? else {
            return Ok(None);
        };
        match Self::decode(value) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(source = %source, id = %id, error = ?err, "ignoring undecodable cache record");
                Ok(None)
            },
        }
    }

    /// Every cached item of a source, in no particular order.
    #[instrument(level = "trace", skip_all, fields(source = %source))]
    pub async fn get_all(&self, source: &SourceId) -> Result<Vec<CacheRecord>> {
        let prefix = source_path(Self::NAMESPACE, source)?;
        let documents = self.store.list(&prefix).await.or_raise(|| ErrorKind::Store)?;
        documents
            .into_iter()
            .filter(|(path, _)| path.depth() == prefix.depth() + 1)
            .map(|(_, value)| Self::decode(value))
            .collect()
    }

    /// Reconcile freshly fetched data with the cached copy and write it back.
    ///
    /// See [`Manga::merged_onto`] for the field rules. Never rejects an item
    /// based on its shape; only a store failure makes this fail, and then for
    /// this item alone. A cached copy that no longer decodes is replaced.
    pub async fn merge(&self, incoming: Manga) -> Result<CacheRecord> {
        self.merge_at(incoming, UtcDateTime::now()).await
    }

    /// [`merge`](Self::merge), with an explicit fetch time.
    #[instrument(level = "debug", skip_all, fields(key = %incoming.key()))]
    pub async fn merge_at(&self, incoming: Manga, now: UtcDateTime) -> Result<CacheRecord> {
        let record = match self.get_decodable(&incoming.source, &incoming.id).await? {
            Some(old) => CacheRecord {
                manga: incoming.merged_onto(&old.manga),
                // Clocks can step backwards; the fetch date must not.
                date_fetched: now.max(old.date_fetched),
            },
            None => CacheRecord {
                manga: incoming,
                date_fetched: now,
            },
        };
        let path = Self::item_path(&record.manga.source, &record.manga.id)?;
        let doc = RecordDoc::try_from(&record)?;
        let value = serde_json::to_value(&doc).or_raise(|| ErrorKind::InvalidData("cache record"))?;
        self.store.put(&path, &value).await.or_raise(|| ErrorKind::Store)?;
        debug!(chapters = record.manga.chapters.len(), "merged cache record");
        Ok(record)
    }

    /// Returns `false` if nothing was cached for the item.
    #[instrument(level = "debug", skip_all, fields(source = %source, id = %id))]
    pub async fn remove(&self, source: &SourceId, id: &MangaId) -> Result<bool> {
        let path = Self::item_path(source, id)?;
        self.store.delete(&path).await.or_raise(|| ErrorKind::Store)
    }

    /// Drop every cached record, then recreate the empty entries of the
    /// default sources. Returns the number of documents removed.
    #[instrument(level = "debug", skip_all)]
    pub async fn flush(&self) -> Result<u64> {
        let removed = self.store.clear(Self::NAMESPACE).await.or_raise(|| ErrorKind::Store)?;
        for source in &self.default_sources {
            let path = source_path(Self::NAMESPACE, source)?;
            self.store.put(&path, &json!({})).await.or_raise(|| ErrorKind::Store)?;
        }
        debug!(removed, "flushed cache");
        Ok(removed)
    }

    /// Sources with an entry in the cache, including empty default entries.
    pub async fn sources(&self) -> Result<BTreeSet<SourceId>> {
        let root = DocPath::root(Self::NAMESPACE).or_raise(|| ErrorKind::InvalidData("document path"))?;
        let documents = self.store.list(&root).await.or_raise(|| ErrorKind::Store)?;
        Ok(documents
            .iter()
            .filter_map(|(path, _)| match path.segments() {
                [group, source] | [group, source, _] if group == SOURCES => Some(SourceId::from(source.as_str())),
                _ => None,
            })
            .collect())
    }
}
