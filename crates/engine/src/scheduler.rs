use crate::adapter::AdapterRegistry;
use crate::error::{ErrorKind, Result};
use crate::queue::{PassSummary, UpdateQueue};
use exn::ResultExt;
use shelf_cache::{LibraryIndex, MangaCache};
use shelf_config::{Config, LibrarySettings};
use shelf_models::{Manga, MangaKey, SourceId};
use std::time::Duration;
use time::UtcDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// What a single scheduler tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Updates are manual; the recurring tick stops for good.
    Stopped,
    /// A pass is still running.
    Busy,
    /// The library was bulk-refreshed less than one update interval ago.
    NotDue,
    /// A background pass was started over this many newly queued items.
    Started { queued: usize },
}

/// Feeds the [`UpdateQueue`] from the library on a fixed cadence, and
/// exposes the manual entry points (enqueue, refresh now, clear).
///
/// The cadence only decides how often staleness is *checked*; how often items
/// are actually refreshed is the configured update frequency, read afresh on
/// every tick from a [`watch`] channel so settings changes apply without a
/// restart.
#[derive(Clone)]
pub struct RefreshScheduler {
    queue: UpdateQueue,
    library: LibraryIndex,
    cache: MangaCache,
    settings: watch::Receiver<LibrarySettings>,
    tick: Duration,
}
impl RefreshScheduler {
    pub fn new(
        queue: UpdateQueue,
        library: LibraryIndex,
        cache: MangaCache,
        settings: watch::Receiver<LibrarySettings>,
    ) -> Self {
        Self {
            queue,
            library,
            cache,
            settings,
            tick: DEFAULT_TICK,
        }
    }

    /// Build the queue and the scheduler from loaded configuration.
    ///
    /// The returned sender publishes library settings changes to the
    /// scheduler; they take effect on its next tick.
    pub fn from_config(
        config: &Config,
        cache: MangaCache,
        library: LibraryIndex,
        adapters: AdapterRegistry,
    ) -> (Self, watch::Sender<LibrarySettings>) {
        let queue = UpdateQueue::with_fetch_timeout(cache.clone(), adapters, config.scheduler.fetch_timeout());
        let (settings, receiver) = watch::channel(config.library);
        let scheduler = Self::new(queue, library, cache, receiver).with_tick(config.scheduler.tick());
        (scheduler, settings)
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    /// Run [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Tick until updates are switched to manual.
    pub async fn run(self) {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.tick_at(UtcDateTime::now()).await {
                Ok(TickOutcome::Stopped) => {
                    info!("updates are manual, stopping refresh scheduler");
                    break;
                },
                Ok(outcome) => debug!(?outcome, "scheduler tick"),
                Err(err) => warn!(error = ?err, "scheduler tick failed"),
            }
        }
    }

    /// One tick, as of `now`.
    ///
    /// When due, every stale library item (optionally only ongoing ones) is
    /// queued and a pass is started in the background. The library is marked
    /// as updated straight away, without waiting for the pass.
    #[instrument(level = "debug", skip_all)]
    pub async fn tick_at(&self, now: UtcDateTime) -> Result<TickOutcome> {
        let settings = *self.settings.borrow();
        let Some(frequency) = settings.update_frequency.interval() else {
            return Ok(TickOutcome::Stopped);
        };
        if self.queue.processing() {
            return Ok(TickOutcome::Busy);
        }
        let last_updated = self.library.last_updated().await.or_raise(|| ErrorKind::Cache)?;
        if let Some(last) = last_updated
            && now - last < frequency
        {
            return Ok(TickOutcome::NotDue);
        }

        let stale = self.library.get_stale(frequency, now).await.or_raise(|| ErrorKind::Cache)?;
        let mut queued = 0;
        for (source, ids) in stale {
            for id in ids {
                let key = MangaKey::new(source.clone(), id);
                let snapshot = match self.cache.get_decodable(&key.source, &key.id).await.or_raise(|| ErrorKind::Cache)? {
                    // Items never fetched have no known status yet; refresh them regardless.
                    Some(record) if settings.update_ongoing_manga && !record.manga.is_ongoing() => continue,
                    Some(record) => record.manga,
                    None => Manga::stub(key),
                };
                if self.queue.add(snapshot) {
                    queued += 1;
                }
            }
        }
        info!(queued, "starting scheduled refresh");
        self.start_pass();
        self.library.mark_updated(now).await.or_raise(|| ErrorKind::Cache)?;
        Ok(TickOutcome::Started { queued })
    }

    fn start_pass(&self) {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            if let Err(err) = queue.process().await {
                debug!(error = ?err, "background pass did not run");
            }
        });
    }

    /// Queue one item, from its cached snapshot if there is one. Returns
    /// `false` if it was already queued.
    pub async fn enqueue(&self, key: MangaKey) -> Result<bool> {
        let snapshot = match self.cache.get_decodable(&key.source, &key.id).await.or_raise(|| ErrorKind::Cache)? {
            Some(record) => record.manga,
            None => Manga::stub(key),
        };
        Ok(self.queue.add(snapshot))
    }

    /// Queue every library item of a source. Returns how many were newly
    /// queued.
    pub async fn enqueue_source(&self, source: &SourceId) -> Result<usize> {
        let ids = self.library.list_items(source).await.or_raise(|| ErrorKind::Cache)?;
        let mut queued = 0;
        for id in ids {
            if self.enqueue(MangaKey::new(source.clone(), id)).await? {
                queued += 1;
            }
        }
        debug!(source = %source, queued, "queued source");
        Ok(queued)
    }

    /// Queue every item of every enabled source and run a pass right away,
    /// regardless of cadence or staleness.
    #[instrument(level = "info", skip_all)]
    pub async fn refresh_now(&self) -> Result<PassSummary> {
        if self.queue.processing() {
            exn::bail!(ErrorKind::AlreadyProcessing);
        }
        let sources = self.library.sources().await.or_raise(|| ErrorKind::Cache)?;
        for (source, _) in sources.iter().filter(|(_, state)| state.enabled) {
            self.enqueue_source(source).await?;
        }
        let summary = self.queue.process().await?;
        self.library.mark_updated(UtcDateTime::now()).await.or_raise(|| ErrorKind::Cache)?;
        Ok(summary)
    }

    pub fn clear(&self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ScriptedAdapter;
    use crate::events::UpdateEvent;
    use shelf_config::UpdateFrequency;
    use shelf_models::{MangaId, PublicationStatus};
    use shelf_store::{DocPath, MemoryStore, PersistentStore, StoreHandle};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct Fixture {
        store: StoreHandle,
        cache: MangaCache,
        library: LibraryIndex,
        adapter: Arc<ScriptedAdapter>,
        settings: watch::Sender<LibrarySettings>,
        scheduler: RefreshScheduler,
    }

    fn fixture(fetch_timeout: Duration) -> Fixture {
        let store: StoreHandle = Arc::new(MemoryStore::default());
        let cache = MangaCache::new(store.clone());
        let library = LibraryIndex::new(store.clone(), cache.clone());
        let adapter = Arc::new(ScriptedAdapter::new("mangadex"));
        let queue = UpdateQueue::with_fetch_timeout(
            cache.clone(),
            AdapterRegistry::new().with(adapter.clone()),
            fetch_timeout,
        );
        let (settings, receiver) = watch::channel(LibrarySettings {
            update_frequency: UpdateFrequency::every_seconds(3600),
            update_ongoing_manga: false,
        });
        let scheduler = RefreshScheduler::new(queue, library.clone(), cache.clone(), receiver);
        Fixture {
            store,
            cache,
            library,
            adapter,
            settings,
            scheduler,
        }
    }

    /// Whole seconds, so that timestamps survive the store unchanged.
    fn now() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(UtcDateTime::now().unix_timestamp()).unwrap()
    }

    fn manga(id: &str, status: PublicationStatus) -> Manga {
        let mut manga = Manga::new("mangadex", id, id.to_uppercase());
        manga.status = status;
        manga
    }

    async fn wait_for_completion(events: &mut broadcast::Receiver<UpdateEvent>) {
        while !matches!(events.recv().await.unwrap(), UpdateEvent::CycleComplete) {}
    }

    #[tokio::test]
    async fn test_from_config_applies_scheduler_settings() {
        let mut config = Config::default();
        config.scheduler.tick_seconds = 15;
        config.scheduler.fetch_timeout_seconds = 1;
        config.library.update_frequency = UpdateFrequency::every_seconds(7200);
        let store: StoreHandle = Arc::new(MemoryStore::default());
        let cache = MangaCache::new(store.clone());
        let library = LibraryIndex::new(store, cache.clone());
        let adapter = Arc::new(ScriptedAdapter::new("mangadex"));
        adapter.hang("slow");
        let registry = AdapterRegistry::new().with(adapter.clone());

        let (scheduler, settings) = RefreshScheduler::from_config(&config, cache, library, registry);
        assert_eq!(scheduler.tick(), Duration::from_secs(15));
        assert_eq!(scheduler.queue().fetch_timeout(), Duration::from_secs(1));
        assert_eq!(scheduler.settings.borrow().update_frequency, UpdateFrequency::every_seconds(7200));

        // The configured bound is what ends a hung fetch.
        scheduler.enqueue(MangaKey::new("mangadex", "slow")).await.unwrap();
        let summary = scheduler.queue().process().await.unwrap();
        assert_eq!(summary.failed, 1);

        settings.send_modify(|s| s.update_frequency = UpdateFrequency::Manual);
        assert_eq!(scheduler.tick_at(now()).await.unwrap(), TickOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_undecodable_record_does_not_stop_ticks() {
        let f = fixture(Duration::from_secs(5));
        let source = SourceId::from("mangadex");
        f.library.add_item(&source, &MangaId::from("bad")).await.unwrap();
        f.adapter.set_item(manga("bad", PublicationStatus::Ongoing));
        let path = DocPath::root(MangaCache::NAMESPACE)
            .and_then(|p| p.child("Sources"))
            .and_then(|p| p.child("mangadex"))
            .and_then(|p| p.child("bad"))
            .unwrap();
        let unreadable = serde_json::json!({
            "Source": "mangadex",
            "Id": "bad",
            "Authors": [{"Name": "Someone", "Kind": "letterer"}],
            "DateFetched": 1_700_000_000_000i64,
        });
        f.store.put(&path, &unreadable).await.unwrap();

        let mut events = f.scheduler.queue().subscribe();
        assert_eq!(f.scheduler.tick_at(now()).await.unwrap(), TickOutcome::Started { queued: 1 });
        wait_for_completion(&mut events).await;
        assert!(f.cache.get(&source, &MangaId::from("bad")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_manual_frequency_stops() {
        let f = fixture(Duration::from_secs(5));
        f.settings.send_modify(|s| s.update_frequency = UpdateFrequency::Manual);
        assert_eq!(f.scheduler.tick_at(now()).await.unwrap(), TickOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_manual_frequency_ends_run_loop() {
        let f = fixture(Duration::from_secs(5));
        f.settings.send_modify(|s| s.update_frequency = UpdateFrequency::Manual);
        // The first interval tick completes immediately.
        f.scheduler.with_tick(Duration::from_millis(10)).spawn().await.unwrap();
    }

    #[tokio::test]
    async fn test_not_due_within_frequency() {
        let f = fixture(Duration::from_secs(5));
        let now = now();
        f.library.add_item(&SourceId::from("mangadex"), &MangaId::from("a")).await.unwrap();
        f.library.mark_updated(now - time::Duration::seconds(600)).await.unwrap();
        assert_eq!(f.scheduler.tick_at(now).await.unwrap(), TickOutcome::NotDue);
        assert_eq!(f.scheduler.queue().queued_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_queues_stale_items_and_marks_updated() {
        let f = fixture(Duration::from_secs(5));
        let now = now();
        let source = SourceId::from("mangadex");
        for id in ["never", "stale", "fresh"] {
            f.library.add_item(&source, &MangaId::from(id)).await.unwrap();
            f.adapter.set_item(manga(id, PublicationStatus::Ongoing));
        }
        f.cache
            .merge_at(manga("stale", PublicationStatus::Ongoing), now - time::Duration::days(2))
            .await
            .unwrap();
        f.cache.merge_at(manga("fresh", PublicationStatus::Ongoing), now).await.unwrap();

        let mut events = f.scheduler.queue().subscribe();
        assert_eq!(f.scheduler.tick_at(now).await.unwrap(), TickOutcome::Started { queued: 2 });
        // Recorded without waiting for the pass.
        assert_eq!(f.library.last_updated().await.unwrap(), Some(now));
        wait_for_completion(&mut events).await;
        assert!(f.cache.get(&source, &MangaId::from("never")).await.unwrap().is_some());
        assert_eq!(f.scheduler.queue().queued_count(), 0);
    }

    #[tokio::test]
    async fn test_ongoing_only_filter() {
        let f = fixture(Duration::from_secs(5));
        let now = now();
        let source = SourceId::from("mangadex");
        f.settings.send_modify(|s| s.update_ongoing_manga = true);
        for (id, status) in [("done", PublicationStatus::Completed), ("going", PublicationStatus::Ongoing)] {
            f.library.add_item(&source, &MangaId::from(id)).await.unwrap();
            f.cache.merge_at(manga(id, status), now - time::Duration::days(2)).await.unwrap();
            f.adapter.set_item(manga(id, status));
        }
        f.library.add_item(&source, &MangaId::from("unknown")).await.unwrap();
        f.adapter.set_item(manga("unknown", PublicationStatus::Unknown));

        let mut events = f.scheduler.queue().subscribe();
        assert_eq!(f.scheduler.tick_at(now).await.unwrap(), TickOutcome::Started { queued: 2 });
        assert!(!f.scheduler.queue().contains(&MangaKey::new("mangadex", "done")));
        wait_for_completion(&mut events).await;
    }

    #[tokio::test]
    async fn test_busy_while_processing() {
        let f = fixture(Duration::from_millis(100));
        f.adapter.hang("slow");
        f.scheduler.enqueue(MangaKey::new("mangadex", "slow")).await.unwrap();
        let queue = f.scheduler.queue().clone();
        let pass = tokio::spawn(async move { queue.process().await });
        while !f.scheduler.queue().processing() {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.scheduler.tick_at(now()).await.unwrap(), TickOutcome::Busy);
        let summary = pass.await.unwrap().unwrap();
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_enqueue_source_and_refresh_now() {
        let f = fixture(Duration::from_secs(5));
        let source = SourceId::from("mangadex");
        for id in ["a", "b"] {
            f.library.add_item(&source, &MangaId::from(id)).await.unwrap();
            f.adapter.set_item(manga(id, PublicationStatus::Ongoing));
        }
        assert_eq!(f.scheduler.enqueue_source(&source).await.unwrap(), 2);
        assert_eq!(f.scheduler.enqueue_source(&source).await.unwrap(), 0);
        f.scheduler.clear();

        let summary = f.scheduler.refresh_now().await.unwrap();
        assert_eq!(summary.updated.len(), 2);
        assert!(f.library.last_updated().await.unwrap().is_some());
        assert_eq!(f.adapter.fetch_calls(), 1);
    }
}
