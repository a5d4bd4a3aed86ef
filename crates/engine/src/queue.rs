use crate::adapter::error::ErrorKind as AdapterErrorKind;
use crate::adapter::{AdapterHandle, AdapterRegistry, FetchFuture};
use crate::error::{ErrorKind, Result};
use crate::events::{EventBus, NewChaptersNotice, UpdateEvent};
use exn::ResultExt;
use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use shelf_cache::{CacheRecord, MangaCache};
use shelf_models::{Manga, MangaId, MangaKey, SourceId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// What a single pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Items in the queue when the pass started.
    pub queued: usize,
    /// Items merged into the cache, in completion order.
    pub updated: Vec<MangaKey>,
    /// Items that could not be fetched or merged.
    pub failed: usize,
    /// Items whose source adapter could not be resolved.
    pub skipped: usize,
    /// The single new-chapters announcement of the pass, if any item gained chapters.
    pub notice: Option<NewChaptersNotice>,
}

/// Transient, ordered set of items waiting to be refreshed.
///
/// The queue is the engine's unit of work: [`process`](Self::process) drains
/// it in one pass, fetching every queued item from its source and merging the
/// results into the cache. Membership is keyed by `(source, id)`.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct UpdateQueue {
    inner: Arc<Inner>,
}

struct Inner {
    cache: MangaCache,
    adapters: AdapterRegistry,
    fetch_timeout: Duration,
    entries: Mutex<Vec<Manga>>,
    processing: AtomicBool,
    processed: AtomicUsize,
    events: EventBus,
}

struct Settled {
    record: CacheRecord,
    has_new_chapters: bool,
}

impl UpdateQueue {
    pub fn new(cache: MangaCache, adapters: AdapterRegistry) -> Self {
        Self::with_fetch_timeout(cache, adapters, DEFAULT_FETCH_TIMEOUT)
    }

    /// A queue that gives up on any single item fetch after `fetch_timeout`.
    pub fn with_fetch_timeout(cache: MangaCache, adapters: AdapterRegistry, fetch_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                adapters,
                fetch_timeout,
                entries: Mutex::new(vec![]),
                processing: AtomicBool::new(false),
                processed: AtomicUsize::new(0),
                events: EventBus::new(),
            }),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.inner.fetch_timeout
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.inner.events.subscribe()
    }

    /// Queue an item snapshot. Returns `false` (and changes nothing) if the
    /// item is already queued.
    pub fn add(&self, manga: Manga) -> bool {
        let key = manga.key();
        let mut entries = self.inner.entries();
        if entries.iter().any(|queued| has_key(queued, &key)) {
            debug!(key = %key, "already queued");
            return false;
        }
        entries.push(manga);
        true
    }

    pub fn remove(&self, key: &MangaKey) -> bool {
        let mut entries = self.inner.entries();
        let before = entries.len();
        entries.retain(|queued| !has_key(queued, key));
        entries.len() != before
    }

    pub fn clear(&self) {
        self.inner.entries().clear();
    }

    pub fn contains(&self, key: &MangaKey) -> bool {
        self.inner.entries().iter().any(|queued| has_key(queued, key))
    }

    pub fn snapshot(&self) -> Vec<Manga> {
        self.inner.entries().clone()
    }

    pub fn processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    /// Items merged so far in the current (or last) pass.
    pub fn processed_count(&self) -> usize {
        self.inner.processed.load(Ordering::SeqCst)
    }

    pub fn queued_count(&self) -> usize {
        self.inner.entries().len()
    }

    /// Run one refresh pass over everything currently queued.
    ///
    /// Items are grouped by source and every source is fetched concurrently;
    /// each item is merged as soon as it arrives. A failing adapter, item or
    /// cache write only costs that source or item its place in this pass. When
    /// the pass ends, however it ends, the queue is empty and idle again.
    ///
    /// Fails only with [`ErrorKind::AlreadyProcessing`], without touching the
    /// queue, if another pass is still running.
    #[instrument(level = "info", skip_all)]
    pub async fn process(&self) -> Result<PassSummary> {
        let Some(guard) = PassGuard::acquire(&self.inner) else {
            debug!("refresh pass already in progress");
            exn::bail!(ErrorKind::AlreadyProcessing);
        };
        self.inner.processed.store(0, Ordering::SeqCst);
        let snapshot = self.snapshot();
        self.inner.events.emit(UpdateEvent::CycleStart { queued: snapshot.len() });

        let summary = self.inner.run(snapshot).await;
        if let Some(notice) = &summary.notice {
            info!(title = %notice.title, others = notice.others, "new chapters available");
            self.inner.events.emit(UpdateEvent::NewChapters(notice.clone()));
        }
        info!(
            queued = summary.queued,
            updated = summary.updated.len(),
            failed = summary.failed,
            skipped = summary.skipped,
            "refresh pass complete"
        );

        drop(guard);
        self.inner.events.emit(UpdateEvent::CycleComplete);
        Ok(summary)
    }
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, Vec<Manga>> {
        // Entries are plain data; a panic elsewhere cannot leave them torn.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self, snapshot: Vec<Manga>) -> PassSummary {
        let mut summary = PassSummary {
            queued: snapshot.len(),
            ..PassSummary::default()
        };

        let mut by_source: BTreeMap<SourceId, Vec<MangaId>> = BTreeMap::new();
        for manga in snapshot {
            by_source.entry(manga.source).or_default().push(manga.id);
        }

        let resolutions = join_all(by_source.into_iter().map(|(source, ids)| async move {
            let adapter = self.adapters.resolve(&source).await;
            (source, ids, adapter)
        }))
        .await;
        let mut batches: Vec<(AdapterHandle, Vec<MangaId>)> = Vec::with_capacity(resolutions.len());
        for (source, ids, adapter) in resolutions {
            match adapter {
                Ok(adapter) => batches.push((adapter, ids)),
                Err(err) => {
                    warn!(source = %source, items = ids.len(), error = ?err, "skipping source for this pass");
                    summary.skipped += ids.len();
                },
            }
        }

        let mut pending = FuturesUnordered::new();
        for (adapter, ids) in &batches {
            let fetches = adapter.fetch(ids, true);
            if fetches.len() != ids.len() {
                warn!(
                    source = %adapter.id(),
                    requested = ids.len(),
                    returned = fetches.len(),
                    "adapter returned a different number of fetches than requested"
                );
                summary.failed += ids.len().saturating_sub(fetches.len());
            }
            for (id, fetch) in ids.iter().zip(fetches) {
                pending.push(self.settle(MangaKey::new(adapter.id().clone(), id.clone()), fetch));
            }
        }

        let mut with_new_chapters = vec![];
        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok(Settled { record, has_new_chapters }) => {
                    self.processed.fetch_add(1, Ordering::SeqCst);
                    summary.updated.push(record.key());
                    if has_new_chapters {
                        with_new_chapters.push(record.clone());
                    }
                    let source = record.manga.source.clone();
                    self.events.emit(UpdateEvent::MangaUpdated {
                        record: Box::new(record),
                        source,
                    });
                },
                Err(err) => {
                    warn!(error = ?err, "item dropped from this pass");
                    summary.failed += 1;
                },
            }
        }

        summary.notice = consolidate(&with_new_chapters);
        summary
    }

    /// Wait for one item, then merge it into the cache.
    async fn settle(&self, key: MangaKey, fetch: FetchFuture<'_>) -> Result<Settled> {
        let fetched = timeout(self.fetch_timeout, fetch)
            .await
            .unwrap_or_else(|_| Err(exn::Exn::from(AdapterErrorKind::Timeout)));
        let manga = fetched.or_raise(|| ErrorKind::AdapterFetch(key.clone()))?;
        if manga.key() != key {
            return Err(exn::Exn::from(AdapterErrorKind::InvalidResponse("item returned under another key")))
                .or_raise(|| ErrorKind::AdapterFetch(key));
        }

        let previous = self.cache.get_decodable(&key.source, &key.id).await.or_raise(|| ErrorKind::Cache)?;
        // A first fetch is not "new chapters", however many it lists.
        let has_new_chapters = previous.as_ref().is_some_and(|old| manga.has_more_chapters_than(&old.manga));
        let record = self.cache.merge(manga).await.or_raise(|| ErrorKind::Merge(key))?;
        Ok(Settled { record, has_new_chapters })
    }
}

/// Held for the whole of a pass. Dropping it drains the queue and returns it
/// to idle, whether the pass finished, failed or was cancelled.
struct PassGuard<'a> {
    inner: &'a Inner,
}
impl<'a> PassGuard<'a> {
    fn acquire(inner: &'a Inner) -> Option<Self> {
        inner
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { inner })
    }
}
impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.inner.entries().clear();
        self.inner.processing.store(false, Ordering::Release);
    }
}

fn has_key(manga: &Manga, key: &MangaKey) -> bool {
    manga.source == key.source && manga.id == key.id
}

/// One notice for the whole pass, about the affected item read longest ago.
/// Items never read at all count as the oldest.
fn consolidate(with_new_chapters: &[CacheRecord]) -> Option<NewChaptersNotice> {
    let primary = with_new_chapters.iter().min_by_key(|record| record.manga.last_read_at)?;
    Some(NewChaptersNotice {
        title: primary.manga.title.clone(),
        primary: primary.key(),
        others: with_new_chapters.len() - 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_store::MemoryStore;
    use time::UtcDateTime;

    fn queue() -> UpdateQueue {
        UpdateQueue::new(MangaCache::new(Arc::new(MemoryStore::default())), AdapterRegistry::new())
    }

    fn record(id: &str, last_read_at: Option<i64>) -> CacheRecord {
        let mut manga = Manga::new("mangadex", id, id.to_uppercase());
        manga.last_read_at = last_read_at.map(|t| UtcDateTime::from_unix_timestamp(t).unwrap());
        CacheRecord {
            manga,
            date_fetched: UtcDateTime::from_unix_timestamp(0).unwrap(),
        }
    }

    #[test]
    fn test_add_deduplicates() {
        let queue = queue();
        assert!(queue.add(Manga::new("mangadex", "a", "A")));
        assert!(!queue.add(Manga::new("mangadex", "a", "A (again)")));
        assert_eq!(queue.queued_count(), 1);
        assert_eq!(queue.snapshot()[0].title, "A");
        // Same id, different source: a different item.
        assert!(queue.add(Manga::new("other", "a", "A")));
        assert_eq!(queue.queued_count(), 2);
    }

    #[test]
    fn test_remove_contains_clear() {
        let queue = queue();
        queue.add(Manga::new("mangadex", "a", "A"));
        queue.add(Manga::new("mangadex", "b", "B"));
        assert!(queue.contains(&MangaKey::new("mangadex", "a")));
        assert!(queue.remove(&MangaKey::new("mangadex", "a")));
        assert!(!queue.remove(&MangaKey::new("mangadex", "a")));
        assert!(!queue.contains(&MangaKey::new("mangadex", "a")));
        queue.clear();
        assert_eq!(queue.queued_count(), 0);
    }

    #[tokio::test]
    async fn test_process_while_processing_is_rejected() {
        let queue = queue();
        queue.add(Manga::new("mangadex", "a", "A"));
        let guard = PassGuard::acquire(&queue.inner).unwrap();
        assert!(queue.processing());
        let err = queue.process().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyProcessing));
        assert_eq!(queue.queued_count(), 1);
        drop(guard);
        assert!(!queue.processing());
    }

    #[tokio::test]
    async fn test_empty_pass() {
        let queue = queue();
        let mut events = queue.subscribe();
        let summary = queue.process().await.unwrap();
        assert_eq!(summary, PassSummary::default());
        assert!(matches!(events.recv().await.unwrap(), UpdateEvent::CycleStart { queued: 0 }));
        assert!(matches!(events.recv().await.unwrap(), UpdateEvent::CycleComplete));
    }

    #[tokio::test]
    async fn test_unresolvable_source_is_skipped_and_drained() {
        let queue = queue();
        queue.add(Manga::new("nowhere", "a", "A"));
        queue.add(Manga::new("nowhere", "b", "B"));
        let summary = queue.process().await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert!(summary.updated.is_empty());
        assert_eq!(queue.queued_count(), 0);
        assert!(!queue.processing());
    }

    #[test]
    fn test_consolidate_picks_oldest_read() {
        let notice = consolidate(&[record("b", Some(200)), record("a", Some(100)), record("c", Some(300))]).unwrap();
        assert_eq!(notice.primary, MangaKey::new("mangadex", "a"));
        assert_eq!(notice.title, "A");
        assert_eq!(notice.others, 2);
    }

    #[test]
    fn test_consolidate_never_read_counts_as_oldest() {
        let notice = consolidate(&[record("a", Some(100)), record("b", None)]).unwrap();
        assert_eq!(notice.primary, MangaKey::new("mangadex", "b"));
    }

    #[test]
    fn test_consolidate_nothing_new() {
        assert_eq!(consolidate(&[]), None);
    }
}
