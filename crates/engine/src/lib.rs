//! Refresh engine.
//!
//! Decides which library items are stale, fetches them from their sources
//! concurrently, merges the results into the [`MangaCache`] without losing
//! user-local state, and announces newly published chapters.
//!
//! ```text
//! RefreshScheduler tick ─▶ LibraryIndex::get_stale ─▶ UpdateQueue::add
//!                                                          │
//!                UpdateQueue::process ◀────────────────────┘
//!                    │  group by source, resolve adapters
//!                    │  fetch every source concurrently
//!                    │  merge each item as it arrives
//!                    ▼
//!             UpdateEvent broadcast (start, per item, new chapters, complete)
//! ```
//!
//! Failures are isolated per item wherever possible and per source
//! otherwise; nothing that goes wrong with one item ends a pass early. There
//! is no retry inside a pass: the next scheduler tick finds the item still
//! stale and queues it again.
//!
//! [`MangaCache`]: shelf_cache::MangaCache

pub mod adapter;
pub mod error;
mod events;
mod queue;
mod scheduler;

pub use crate::adapter::{AdapterHandle, AdapterRegistry, SourceAdapter};
pub use crate::events::{NewChaptersNotice, UpdateEvent};
pub use crate::queue::{PassSummary, UpdateQueue};
pub use crate::scheduler::{RefreshScheduler, TickOutcome};
