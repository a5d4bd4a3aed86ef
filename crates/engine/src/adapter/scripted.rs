//! Scripted source adapter for testing.
//!
//! Not gated behind `#[cfg(test)]` so that integration tests (and other
//! crates) can drive the engine without a real catalog.

use crate::adapter::error::{ErrorKind, Result};
use crate::adapter::{FetchFuture, SourceAdapter};
use async_trait::async_trait;
use futures::FutureExt;
use shelf_models::{Manga, MangaId, SourceId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Script {
    Item(Manga),
    Fail,
    Hang,
}

/// Adapter that answers from a fixed script.
///
/// Ids that were never scripted resolve to
/// [`NotFound`](ErrorKind::NotFound).
///
/// # Examples
///
/// ```
/// use shelf_engine::adapter::{ScriptedAdapter, SourceAdapter};
/// use shelf_models::{Manga, MangaId};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let adapter = ScriptedAdapter::new("mangadex").with_item(Manga::new("mangadex", "a", "A"));
/// let mut fetches = adapter.fetch(&[MangaId::from("a"), MangaId::from("b")], true);
/// assert_eq!(fetches.len(), 2);
/// assert!(fetches.pop().unwrap().await.is_err());
/// assert_eq!(fetches.pop().unwrap().await.unwrap().title, "A");
/// # }
/// ```
#[derive(Debug)]
pub struct ScriptedAdapter {
    id: SourceId,
    scripts: Mutex<HashMap<MangaId, Script>>,
    delay: Option<Duration>,
    available: AtomicBool,
    fetch_calls: AtomicUsize,
}
impl ScriptedAdapter {
    pub fn new(id: impl Into<SourceId>) -> Self {
        Self {
            id: id.into(),
            scripts: Mutex::new(HashMap::new()),
            delay: None,
            available: AtomicBool::new(true),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_item(self, manga: Manga) -> Self {
        self.set_item(manga);
        self
    }

    /// Every fetch waits this long before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail readiness checks, as an adapter that cannot be instantiated would.
    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    /// Answer fetches of this item's id with the item.
    pub fn set_item(&self, manga: Manga) {
        self.scripts().insert(manga.id.clone(), Script::Item(manga));
    }

    /// Answer fetches of `id` with a network error.
    pub fn fail(&self, id: impl Into<MangaId>) {
        self.scripts().insert(id.into(), Script::Fail);
    }

    /// Never resolve fetches of `id`.
    pub fn hang(&self, id: impl Into<MangaId>) {
        self.scripts().insert(id.into(), Script::Hang);
    }

    /// Number of times [`fetch`](SourceAdapter::fetch) was called.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn scripts(&self) -> std::sync::MutexGuard<'_, HashMap<MangaId, Script>> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn ready(&self) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unavailable);
        }
        Ok(())
    }

    fn fetch(&self, ids: &[MangaId], _full: bool) -> Vec<FetchFuture<'_>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let scripts = self.scripts();
        ids.iter()
            .map(|id| {
                let script = scripts.get(id).cloned();
                let id = id.clone();
                let delay = self.delay;
                async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    match script {
                        Some(Script::Item(manga)) => Ok(manga),
                        Some(Script::Fail) => Err(exn::Exn::from(ErrorKind::Network)),
                        Some(Script::Hang) => futures::future::pending::<Result<Manga>>().await,
                        None => Err(exn::Exn::from(ErrorKind::NotFound(id))),
                    }
                }
                .boxed()
            })
            .collect()
    }
}
