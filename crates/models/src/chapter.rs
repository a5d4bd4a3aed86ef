use crate::ChapterId;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;

/// A sub-unit of an item: one published chapter, in one language.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: Option<String>,
    /// Chapter ordinal, when the source provides one.
    pub chapter: Option<Ordinal>,
    /// Volume ordinal, when the source provides one.
    pub volume: Option<Ordinal>,
    /// Translated-language tag (e.g. `"en"`, `"pt-br"`).
    pub language: Option<String>,
    pub published: Option<UtcDateTime>,
    pub pages: PageCount,
    /// User-local: when the chapter was last opened.
    pub read_at: Option<UtcDateTime>,
    /// User-local: last page the reader reached (zero-based).
    pub last_page: Option<u32>,
}
impl Chapter {
    pub fn new(id: impl Into<ChapterId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            chapter: None,
            volume: None,
            language: None,
            published: None,
            pages: PageCount::Unknown,
            read_at: None,
            last_page: None,
        }
    }

    pub fn with_chapter(mut self, ordinal: impl Into<Ordinal>) -> Self {
        self.chapter = Some(ordinal.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = PageCount::Known(pages);
        self
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// A chapter or volume number.
///
/// Most sources use decimals (`10`, `10.5`), but some only offer free-form
/// labels (`"Extra"`, `"Prologue"`), which are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Ordinal {
    Number(f64),
    Label(String),
}
impl Ordinal {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Ordinal::Number(n) => Some(*n),
            Ordinal::Label(_) => None,
        }
    }
}
impl FromStr for Ordinal {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Ordinal::Number(n),
            _ => Ordinal::Label(trimmed.to_string()),
        })
    }
}
impl From<f64> for Ordinal {
    fn from(n: f64) -> Self {
        Ordinal::Number(n)
    }
}
impl From<u32> for Ordinal {
    fn from(n: u32) -> Self {
        Ordinal::Number(f64::from(n))
    }
}
impl From<&str> for Ordinal {
    fn from(s: &str) -> Self {
        // Infallible
        s.parse().unwrap_or_else(|_| Ordinal::Label(s.to_string()))
    }
}
impl Display for Ordinal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Ordinal::Number(n) => write!(f, "{n}"),
            Ordinal::Label(label) => f.write_str(label),
        }
    }
}

/// Number of pages in a chapter. Persisted as `-1` when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageCount {
    #[default]
    Unknown,
    Known(u32),
}
impl PageCount {
    pub const UNKNOWN_SENTINEL: i64 = -1;

    /// Any negative value (or one too large to be a page count) is unknown.
    pub fn from_raw(raw: i64) -> Self {
        match u32::try_from(raw) {
            Ok(n) => PageCount::Known(n),
            Err(_) => PageCount::Unknown,
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            PageCount::Known(n) => i64::from(*n),
            PageCount::Unknown => Self::UNKNOWN_SENTINEL,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, PageCount::Known(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10", Ordinal::Number(10.0))]
    #[case(" 10.5 ", Ordinal::Number(10.5))]
    #[case("Extra", Ordinal::Label("Extra".to_string()))]
    #[case("NaN", Ordinal::Label("NaN".to_string()))]
    fn test_ordinal_from_str(#[case] input: &str, #[case] expected: Ordinal) {
        assert_eq!(input.parse::<Ordinal>().unwrap(), expected);
    }

    #[rstest]
    #[case(-1, PageCount::Unknown)]
    #[case(-42, PageCount::Unknown)]
    #[case(0, PageCount::Known(0))]
    #[case(24, PageCount::Known(24))]
    fn test_page_count_from_raw(#[case] raw: i64, #[case] expected: PageCount) {
        assert_eq!(PageCount::from_raw(raw), expected);
    }

    #[test]
    fn test_page_count_unknown_is_sentinel() {
        assert_eq!(PageCount::Unknown.as_raw(), -1);
        assert_eq!(PageCount::Known(7).as_raw(), 7);
    }
}
