use crate::MangaCache;
use crate::error::{ErrorKind, Result};
use crate::models::{SourceDoc, from_millis, to_millis};
use crate::{SOURCES, source_path};
use exn::ResultExt;
use shelf_models::{MangaId, SourceId};
use shelf_store::{DocPath, StoreHandle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::UtcDateTime;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// What the library knows about one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceState {
    /// Whether the source takes part in background refresh at all.
    pub enabled: bool,
    /// Last successful bulk refresh, `None` if there never was one.
    pub last_updated: Option<UtcDateTime>,
    pub items: usize,
}

/// Owner of the `Library` namespace: which items the user explicitly added,
/// per source.
///
/// Cheap to clone. Clones share a write lock, so concurrent read-modify-write
/// cycles on the same source document do not lose updates.
#[derive(Clone)]
pub struct LibraryIndex {
    store: StoreHandle,
    cache: MangaCache,
    write_lock: Arc<Mutex<()>>,
}
impl LibraryIndex {
    pub const NAMESPACE: &'static str = "Library";

    /// The cache is consulted (never modified) to decide staleness.
    pub fn new(store: StoreHandle, cache: MangaCache) -> Self {
        Self {
            store,
            cache,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read(&self, source: &SourceId) -> Result<Option<SourceDoc>> {
        let path = source_path(Self::NAMESPACE, source)?;
        match self.store.get(&path).await.or_raise(|| ErrorKind::Store)? {
            Some(value) => Ok(Some(serde_json::from_value(value).or_raise(|| ErrorKind::InvalidData("library entry"))?)),
            None => Ok(None),
        }
    }

    async fn write(&self, source: &SourceId, doc: &SourceDoc) -> Result<()> {
        let path = source_path(Self::NAMESPACE, source)?;
        let value = serde_json::to_value(doc).or_raise(|| ErrorKind::InvalidData("library entry"))?;
        self.store.put(&path, &value).await.or_raise(|| ErrorKind::Store)
    }

    async fn all(&self) -> Result<Vec<(SourceId, SourceDoc)>> {
        let root = DocPath::root(Self::NAMESPACE).or_raise(|| ErrorKind::InvalidData("document path"))?;
        let documents = self.store.list(&root).await.or_raise(|| ErrorKind::Store)?;
        documents
            .into_iter()
            .filter_map(|(path, value)| match path.segments() {
                [group, source] if group == SOURCES => Some((SourceId::from(source.as_str()), value)),
                _ => None,
            })
            .map(|(source, value)| -> Result<(SourceId, SourceDoc)> {
                let doc = serde_json::from_value(value).or_raise(|| ErrorKind::InvalidData("library entry"))?;
                Ok((source, doc))
            })
            .collect()
    }

    /// Returns `false` if the item was already in the library.
    #[instrument(level = "debug", skip_all, fields(source = %source, id = %id))]
    pub async fn add_item(&self, source: &SourceId, id: &MangaId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read(source).await?.unwrap_or_default();
        if doc.manga.iter().any(|existing| existing == id.as_str()) {
            debug!("already in library");
            return Ok(false);
        }
        doc.manga.push(id.to_string());
        self.write(source, &doc).await?;
        Ok(true)
    }

    /// Returns `false` if the item was not in the library. The cache record is
    /// left alone.
    #[instrument(level = "debug", skip_all, fields(source = %source, id = %id))]
    pub async fn remove_item(&self, source: &SourceId, id: &MangaId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut doc) = self.read(source).await? else {
            return Ok(false);
        };
        let before = doc.manga.len();
        doc.manga.retain(|existing| existing != id.as_str());
        if doc.manga.len() == before {
            return Ok(false);
        }
        self.write(source, &doc).await?;
        Ok(true)
    }

    /// Item ids of a source, in the order they were added.
    pub async fn list_items(&self, source: &SourceId) -> Result<Vec<MangaId>> {
        Ok(self
            .read(source)
            .await?
            .map(|doc| doc.manga.into_iter().map(MangaId::from).collect())
            .unwrap_or_default())
    }

    pub async fn sources(&self) -> Result<BTreeMap<SourceId, SourceState>> {
        self.all()
            .await?
            .into_iter()
            .map(|(source, doc)| -> Result<(SourceId, SourceState)> {
                let state = SourceState {
                    enabled: doc.enabled,
                    last_updated: last_updated(&doc)?,
                    items: doc.manga.len(),
                };
                Ok((source, state))
            })
            .collect()
    }

    /// Include or exclude a source from background refresh. Creates an empty
    /// entry for sources the library has not seen yet.
    #[instrument(level = "debug", skip_all, fields(source = %source, enabled = enabled))]
    pub async fn set_enabled(&self, source: &SourceId, enabled: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read(source).await?.unwrap_or_default();
        doc.enabled = enabled;
        self.write(source, &doc).await
    }

    /// When the library as a whole was last bulk-refreshed: the oldest
    /// timestamp among enabled sources. `None` when an enabled source has never
    /// been refreshed, or when no source is enabled.
    pub async fn last_updated(&self) -> Result<Option<UtcDateTime>> {
        let mut oldest: Option<UtcDateTime> = None;
        for (_, doc) in self.all().await?.into_iter().filter(|(_, doc)| doc.enabled) {
            let Some(updated) = last_updated(&doc)? else {
                return Ok(None);
            };
            oldest = Some(oldest.map_or(updated, |o| o.min(updated)));
        }
        Ok(oldest)
    }

    /// Record a bulk refresh of every enabled source.
    #[instrument(level = "debug", skip_all)]
    pub async fn mark_updated(&self, now: UtcDateTime) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let millis = to_millis(now)?;
        for (source, mut doc) in self.all().await?.into_iter().filter(|(_, doc)| doc.enabled) {
            doc.last_updated = millis;
            self.write(&source, &doc).await?;
        }
        Ok(())
    }

    /// For every enabled source, the library items whose cache record is older
    /// than `threshold`, or which have never been fetched at all. A record that
    /// no longer decodes counts as never fetched, so the next refresh rewrites
    /// it. Sources without stale items are left out.
    #[instrument(level = "debug", skip_all, fields(threshold = threshold.as_secs()))]
    pub async fn get_stale(&self, threshold: Duration, now: UtcDateTime) -> Result<BTreeMap<SourceId, Vec<MangaId>>> {
        let mut stale = BTreeMap::new();
        for (source, doc) in self.all().await?.into_iter().filter(|(_, doc)| doc.enabled) {
            let mut ids = vec![];
            for id in doc.manga.into_iter().map(MangaId::from) {
                let is_stale = match self.cache.get_decodable(&source, &id).await? {
                    Some(record) => record.is_stale(threshold, now),
                    None => true,
                };
                if is_stale {
                    ids.push(id);
                }
            }
            if !ids.is_empty() {
                debug!(source = %source, count = ids.len(), "stale items");
                stale.insert(source, ids);
            }
        }
        Ok(stale)
    }
}

fn last_updated(doc: &SourceDoc) -> Result<Option<UtcDateTime>> {
    match doc.last_updated {
        0 => Ok(None),
        millis => from_millis(millis).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_models::Manga;
    use shelf_store::{MemoryStore, PersistentStore};

    fn index() -> (MangaCache, LibraryIndex) {
        let store: StoreHandle = Arc::new(MemoryStore::default());
        let cache = MangaCache::new(store.clone());
        (cache.clone(), LibraryIndex::new(store, cache))
    }

    fn now() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn ids(ids: &[&str]) -> Vec<MangaId> {
        ids.iter().map(|id| MangaId::from(*id)).collect()
    }

    #[tokio::test]
    async fn test_add_and_remove_are_idempotent() {
        let (_, library) = index();
        let source = SourceId::from("mangadex");
        assert!(library.add_item(&source, &MangaId::from("a")).await.unwrap());
        assert!(!library.add_item(&source, &MangaId::from("a")).await.unwrap());
        assert!(library.add_item(&source, &MangaId::from("b")).await.unwrap());
        assert_eq!(library.list_items(&source).await.unwrap(), ids(&["a", "b"]));
        assert!(library.remove_item(&source, &MangaId::from("a")).await.unwrap());
        assert!(!library.remove_item(&source, &MangaId::from("a")).await.unwrap());
        assert!(!library.remove_item(&SourceId::from("nowhere"), &MangaId::from("a")).await.unwrap());
        assert_eq!(library.list_items(&source).await.unwrap(), ids(&["b"]));
    }

    #[tokio::test]
    async fn test_removing_keeps_cache_record() {
        let (cache, library) = index();
        let source = SourceId::from("mangadex");
        library.add_item(&source, &MangaId::from("a")).await.unwrap();
        cache.merge_at(Manga::new("mangadex", "a", "A"), now()).await.unwrap();
        library.remove_item(&source, &MangaId::from("a")).await.unwrap();
        assert!(cache.get(&source, &MangaId::from("a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_stale() {
        let (cache, library) = index();
        let source = SourceId::from("mangadex");
        for id in ["old", "fresh", "never"] {
            library.add_item(&source, &MangaId::from(id)).await.unwrap();
        }
        cache
            .merge_at(Manga::new("mangadex", "old", "Old"), now() - time::Duration::seconds(7200))
            .await
            .unwrap();
        cache
            .merge_at(Manga::new("mangadex", "fresh", "Fresh"), now() - time::Duration::seconds(1800))
            .await
            .unwrap();
        let stale = library.get_stale(Duration::from_secs(3600), now()).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[&source], ids(&["old", "never"]));
    }

    #[tokio::test]
    async fn test_get_stale_with_undecodable_record() {
        let store = Arc::new(MemoryStore::default());
        let cache = MangaCache::new(store.clone());
        let library = LibraryIndex::new(store.clone(), cache.clone());
        let source = SourceId::from("mangadex");
        for id in ["good", "bad"] {
            library.add_item(&source, &MangaId::from(id)).await.unwrap();
        }
        cache
            .merge_at(Manga::new("mangadex", "good", "Good"), now() - time::Duration::days(3))
            .await
            .unwrap();
        let bad = source_path(MangaCache::NAMESPACE, &source).unwrap().child("bad").unwrap();
        let doc = serde_json::json!({
            "Source": "mangadex",
            "Id": "bad",
            "Authors": [{"Name": "Someone", "Kind": "letterer"}],
            "DateFetched": 1_700_000_000_000i64,
        });
        store.put(&bad, &doc).await.unwrap();

        let stale = library.get_stale(Duration::from_secs(3600), now()).await.unwrap();
        assert_eq!(stale[&source], ids(&["good", "bad"]));
    }

    #[tokio::test]
    async fn test_disabled_sources_are_never_stale() {
        let (_, library) = index();
        let source = SourceId::from("mangadex");
        library.add_item(&source, &MangaId::from("a")).await.unwrap();
        library.set_enabled(&source, false).await.unwrap();
        assert!(library.get_stale(Duration::from_secs(1), now()).await.unwrap().is_empty());
        let sources = library.sources().await.unwrap();
        assert_eq!(
            sources[&source],
            SourceState {
                enabled: false,
                last_updated: None,
                items: 1
            }
        );
    }

    #[tokio::test]
    async fn test_last_updated_tracks_enabled_sources() {
        let (_, library) = index();
        assert_eq!(library.last_updated().await.unwrap(), None);
        library.add_item(&SourceId::from("a"), &MangaId::from("1")).await.unwrap();
        library.add_item(&SourceId::from("b"), &MangaId::from("1")).await.unwrap();
        assert_eq!(library.last_updated().await.unwrap(), None);

        library.mark_updated(now()).await.unwrap();
        assert_eq!(library.last_updated().await.unwrap(), Some(now()));

        // A source added after the bulk refresh has never been refreshed.
        library.add_item(&SourceId::from("c"), &MangaId::from("1")).await.unwrap();
        assert_eq!(library.last_updated().await.unwrap(), None);
        library.set_enabled(&SourceId::from("c"), false).await.unwrap();
        assert_eq!(library.last_updated().await.unwrap(), Some(now()));
    }
}
