use crate::CacheRecord;
use crate::error::{Error, ErrorKind};
use crate::models::{from_millis, opt_from_millis, opt_to_millis, to_millis};
use exn::OptionExt;
use serde::{Deserialize, Serialize};
use shelf_models::{Author, AuthorKind, Chapter, Manga, Ordinal, PageCount, PublicationStatus, Tag, TagKind};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RecordDoc {
    pub(crate) source: String,
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) authors: Vec<AuthorDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) tags: Vec<TagDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) cover: Option<String>,
    #[serde(default)]
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) chapters: Vec<ChapterDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) added_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_read_at: Option<i64>,
    pub(crate) date_fetched: i64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthorDoc {
    name: String,
    kind: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TagDoc {
    name: String,
    #[serde(default)]
    kind: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ChapterDoc {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chapter: Option<OrdinalDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    volume: Option<OrdinalDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published: Option<i64>,
    #[serde(default = "unknown_pages")]
    pages: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    read_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_page: Option<u32>,
}

fn unknown_pages() -> i64 {
    PageCount::UNKNOWN_SENTINEL
}

/// Sources without ordinals send opaque strings instead of numbers.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub(crate) enum OrdinalDoc {
    Number(f64),
    Label(String),
}
impl From<&Ordinal> for OrdinalDoc {
    fn from(ordinal: &Ordinal) -> Self {
        match ordinal {
            Ordinal::Number(n) => OrdinalDoc::Number(*n),
            Ordinal::Label(label) => OrdinalDoc::Label(label.clone()),
        }
    }
}
impl From<OrdinalDoc> for Ordinal {
    fn from(ordinal: OrdinalDoc) -> Self {
        match ordinal {
            OrdinalDoc::Number(n) => Ordinal::Number(n),
            OrdinalDoc::Label(label) => Ordinal::Label(label),
        }
    }
}

impl TryFrom<&Chapter> for ChapterDoc {
    type Error = Error;
    fn try_from(chapter: &Chapter) -> Result<Self, Self::Error> {
        Ok(Self {
            id: chapter.id.to_string(),
            title: chapter.title.clone(),
            chapter: chapter.chapter.as_ref().map(OrdinalDoc::from),
            volume: chapter.volume.as_ref().map(OrdinalDoc::from),
            language: chapter.language.clone(),
            published: opt_to_millis(chapter.published)?,
            pages: chapter.pages.as_raw(),
            read_at: opt_to_millis(chapter.read_at)?,
            last_page: chapter.last_page,
        })
    }
}
impl TryFrom<ChapterDoc> for Chapter {
    type Error = Error;
    fn try_from(doc: ChapterDoc) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.id.into(),
            title: doc.title,
            chapter: doc.chapter.map(Ordinal::from),
            volume: doc.volume.map(Ordinal::from),
            language: doc.language,
            published: opt_from_millis(doc.published)?,
            pages: PageCount::from_raw(doc.pages),
            read_at: opt_from_millis(doc.read_at)?,
            last_page: doc.last_page,
        })
    }
}

impl TryFrom<&CacheRecord> for RecordDoc {
    type Error = Error;
    fn try_from(record: &CacheRecord) -> Result<Self, Self::Error> {
        let manga = &record.manga;
        Ok(Self {
            source: manga.source.to_string(),
            id: manga.id.to_string(),
            title: manga.title.clone(),
            authors: manga
                .authors
                .iter()
                .map(|a| AuthorDoc {
                    name: a.name.clone(),
                    kind: a.kind.as_str().to_string(),
                })
                .collect(),
            synopsis: manga.synopsis.clone(),
            tags: manga
                .tags
                .iter()
                .map(|t| TagDoc {
                    name: t.name.clone(),
                    kind: t.kind.as_str().to_string(),
                })
                .collect(),
            cover: manga.cover.clone(),
            status: manga.status.as_str().to_string(),
            chapters: manga.chapters.iter().map(ChapterDoc::try_from).collect::<Result<Vec<_>, _>>()?,
            added_at: opt_to_millis(manga.added_at)?,
            last_read_at: opt_to_millis(manga.last_read_at)?,
            date_fetched: to_millis(record.date_fetched)?,
        })
    }
}
impl TryFrom<RecordDoc> for CacheRecord {
    type Error = Error;
    fn try_from(doc: RecordDoc) -> Result<Self, Self::Error> {
        let authors = doc
            .authors
            .into_iter()
            .map(|a| -> Result<Author, Error> {
                let kind = a.kind.parse::<AuthorKind>().ok().ok_or_raise(|| ErrorKind::InvalidData("author kind"))?;
                Ok(Author::new(a.name, kind))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let tags = doc
            .tags
            .into_iter()
            .map(|t| {
                let Ok(kind) = t.kind.parse::<TagKind>();
                Tag::new(t.name, kind)
            })
            .collect();
        let Ok(status) = doc.status.parse::<PublicationStatus>();
        let mut manga = Manga::new(doc.source, doc.id, doc.title);
        manga.authors = authors;
        manga.synopsis = doc.synopsis;
        manga.tags = tags;
        manga.cover = doc.cover;
        manga.status = status;
        manga.chapters = doc.chapters.into_iter().map(Chapter::try_from).collect::<Result<Vec<_>, _>>()?;
        manga.added_at = opt_from_millis(doc.added_at)?;
        manga.last_read_at = opt_from_millis(doc.last_read_at)?;
        Ok(Self {
            manga,
            date_fetched: from_millis(doc.date_fetched)?,
        })
    }
}
