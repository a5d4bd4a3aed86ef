//! Durable document store.
//!
//! Every persisted piece of state (the library index, the metadata cache) is
//! a JSON document at a hierarchical [`DocPath`]. Components receive a
//! [`StoreHandle`] at construction time; nothing in the workspace reaches for
//! a global store.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::{MemoryStore, PersistentStore, SqliteStore};
pub use crate::path::DocPath;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn PersistentStore>;
