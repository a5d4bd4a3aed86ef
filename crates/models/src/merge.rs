//! Field-level reconciliation of freshly fetched data with a cached copy.

use crate::{Chapter, Manga, PageCount, PublicationStatus};
use std::collections::HashMap;

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl Manga {
    /// Merge this freshly fetched copy onto a previously known copy.
    ///
    /// 1. Any field this copy leaves absent or empty is taken from `old`.
    ///    Adapters routinely omit fields they could not populate (authors from
    ///    a list endpoint, for instance); an omission is not a deletion.
    /// 2. `added_at` and `last_read_at` come from `old` whenever `old` has
    ///    them, whatever this copy says. They are user-local.
    /// 3. Chapters are matched by id, and each matched chapter is merged the
    ///    same way (read progress being the user-local part).
    ///
    /// The identity of the item is taken from `self`; callers must only merge
    /// copies of the same item.
    pub fn merged_onto(self, old: &Manga) -> Manga {
        debug_assert_eq!(self.key(), old.key(), "merging two different items");
        let chapters = match self.chapters.is_empty() {
            true => old.chapters.clone(),
            false => {
                let previous: HashMap<_, _> = old.chapters.iter().map(|c| (&c.id, c)).collect();
                self.chapters
                    .into_iter()
                    .map(|chapter| match previous.get(&chapter.id) {
                        Some(prior) => chapter.merged_onto(prior),
                        None => chapter,
                    })
                    .collect()
            },
        };
        Manga {
            source: self.source,
            id: self.id,
            title: match self.title.trim().is_empty() {
                true => old.title.clone(),
                false => self.title,
            },
            authors: match self.authors.is_empty() {
                true => old.authors.clone(),
                false => self.authors,
            },
            synopsis: non_blank(self.synopsis).or_else(|| old.synopsis.clone()),
            tags: match self.tags.is_empty() {
                true => old.tags.clone(),
                false => self.tags,
            },
            cover: non_blank(self.cover).or_else(|| old.cover.clone()),
            status: match self.status {
                PublicationStatus::Unknown => old.status,
                status => status,
            },
            chapters,
            added_at: old.added_at.or(self.added_at),
            last_read_at: old.last_read_at.or(self.last_read_at),
        }
    }
}

impl Chapter {
    /// Merge this freshly fetched chapter onto a previously known copy of the
    /// same chapter. Same rules as [`Manga::merged_onto`].
    pub fn merged_onto(self, old: &Chapter) -> Chapter {
        Chapter {
            id: self.id,
            title: non_blank(self.title).or_else(|| old.title.clone()),
            chapter: self.chapter.or_else(|| old.chapter.clone()),
            volume: self.volume.or_else(|| old.volume.clone()),
            language: non_blank(self.language).or_else(|| old.language.clone()),
            published: self.published.or(old.published),
            pages: match self.pages {
                PageCount::Unknown => old.pages,
                known => known,
            },
            read_at: old.read_at.or(self.read_at),
            last_page: old.last_page.or(self.last_page),
        }
    }
}
