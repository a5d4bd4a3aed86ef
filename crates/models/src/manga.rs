use crate::{Author, Chapter, MangaId, MangaKey, SourceId, Tag};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;

/// A tracked item, as known from one source.
///
/// Lightweight list endpoints of a source usually return a partially
/// populated item (no authors, no chapters). A "full" item is one fetched with
/// authors and the complete chapter list resolved; the refresh engine only
/// ever asks adapters for full items.
///
/// `added_at` and `last_read_at` are user-local. Adapters have no way of
/// knowing them and normally leave them empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Manga {
    pub source: SourceId,
    pub id: MangaId,
    pub title: String,
    /// May be empty when fetched from a lightweight endpoint.
    pub authors: Vec<Author>,
    pub synopsis: Option<String>,
    pub tags: Vec<Tag>,
    /// Cover image reference (usually a URL).
    pub cover: Option<String>,
    pub status: PublicationStatus,
    pub chapters: Vec<Chapter>,
    /// When the user added the item to their library.
    pub added_at: Option<UtcDateTime>,
    /// When the user last read any chapter of the item.
    pub last_read_at: Option<UtcDateTime>,
}
impl Manga {
    pub fn new(source: impl Into<SourceId>, id: impl Into<MangaId>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            title: title.into(),
            authors: vec![],
            synopsis: None,
            tags: vec![],
            cover: None,
            status: PublicationStatus::Unknown,
            chapters: vec![],
            added_at: None,
            last_read_at: None,
        }
    }

    /// An item known only by its identity, used to request a first fetch of
    /// something that has never been cached.
    pub fn stub(key: MangaKey) -> Self {
        Self::new(key.source, key.id, String::new())
    }

    pub fn key(&self) -> MangaKey {
        MangaKey::new(self.source.clone(), self.id.clone())
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == PublicationStatus::Ongoing
    }

    /// Whether this copy lists more chapters than `previous`.
    ///
    /// Only counts are compared. A source that replaces chapters one-for-one
    /// is not reported.
    pub fn has_more_chapters_than(&self, previous: &Manga) -> bool {
        self.chapters.len() > previous.chapters.len()
    }
}
impl Display for Manga {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.title.is_empty() {
            true => write!(f, "{}", self.key()),
            false => write!(f, "{} ({})", self.title, self.key()),
        }
    }
}

/// Publication status as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PublicationStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
    #[default]
    Unknown,
}
impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Ongoing => "ongoing",
            PublicationStatus::Completed => "completed",
            PublicationStatus::Hiatus => "hiatus",
            PublicationStatus::Cancelled => "cancelled",
            PublicationStatus::Unknown => "unknown",
        }
    }
}
impl FromStr for PublicationStatus {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "ongoing" | "publishing" => PublicationStatus::Ongoing,
            "completed" | "complete" | "finished" => PublicationStatus::Completed,
            "hiatus" => PublicationStatus::Hiatus,
            "cancelled" | "canceled" | "discontinued" => PublicationStatus::Cancelled,
            _ => PublicationStatus::Unknown,
        })
    }
}
impl Display for PublicationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
