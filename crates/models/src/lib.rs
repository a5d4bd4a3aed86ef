//! Domain types shared by the cache and refresh engine.
//!
//! An item in a user's library (a [`Manga`]) is identified by the pair
//! `(SourceId, MangaId)`: the remote catalog it came from, and the identifier
//! that catalog uses for it. Neither half is meaningful on its own.
//!
//! Freshly fetched metadata never replaces a cached copy wholesale; see
//! [`Manga::merged_onto`] for the field-level rules.

mod author;
mod chapter;
mod ids;
mod manga;
mod merge;
mod tag;

pub use self::author::{Author, AuthorKind};
pub use self::chapter::{Chapter, Ordinal, PageCount};
pub use self::ids::{ChapterId, MangaId, MangaKey, SourceId};
pub use self::manga::{Manga, PublicationStatus};
pub use self::tag::{Tag, TagKind};
