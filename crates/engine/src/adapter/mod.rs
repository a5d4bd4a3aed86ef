//! The contract between the engine and remote catalogs.
//!
//! The engine never knows how a source talks to its catalog. Every source is a
//! [`SourceAdapter`] registered, by id, in an [`AdapterRegistry`] at startup.

pub mod error;
mod registry;
mod scripted;

pub use self::registry::AdapterRegistry;
pub use self::scripted::ScriptedAdapter;
use self::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use shelf_models::{Manga, MangaId, SourceId};
use std::sync::Arc;

/// One pending item fetch.
pub type FetchFuture<'a> = BoxFuture<'a, Result<Manga>>;

pub type AdapterHandle = Arc<dyn SourceAdapter>;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The source this adapter serves. Must be stable for the adapter's
    /// lifetime.
    fn id(&self) -> &SourceId;

    /// Checked once per source per pass, before any fetch. Adapters that
    /// need a login, a token or a warmed-up client report
    /// [`Unavailable`](error::ErrorKind::Unavailable) here.
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    /// Start fetching every item in `ids`.
    ///
    /// Returns one future per requested id, in the same order as `ids`. The
    /// futures may resolve in any order; each resolves to the item or to the
    /// reason it could not be fetched. With `full` set, items come back with
    /// authors and the complete chapter list resolved.
    fn fetch(&self, ids: &[MangaId], full: bool) -> Vec<FetchFuture<'_>>;
}
