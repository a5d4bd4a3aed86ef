use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A tag applied to an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag text
    pub name: String,
    /// Type of tag
    pub kind: TagKind,
}
impl Tag {
    pub fn new(name: impl Into<String>, kind: TagKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Tag type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagKind {
    Genre,
    Theme,
    Format,
    Content,
    #[default]
    Other,
}
impl TagKind {
    /// Returns the display string for the tag kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Genre => "Genre",
            TagKind::Theme => "Theme",
            TagKind::Format => "Format",
            TagKind::Content => "Content",
            TagKind::Other => "Other",
        }
    }
}
impl FromStr for TagKind {
    type Err = std::convert::Infallible;
    /// Sources disagree wildly on tag groups; anything unrecognised is `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "genre" => TagKind::Genre,
            "theme" => TagKind::Theme,
            "format" => TagKind::Format,
            "content" => TagKind::Content,
            _ => TagKind::Other,
        })
    }
}
impl Display for TagKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("genre", TagKind::Genre)]
    #[case("Theme", TagKind::Theme)]
    #[case(" FORMAT ", TagKind::Format)]
    #[case("content", TagKind::Content)]
    #[case("demographic", TagKind::Other)]
    fn test_kind_from_str(#[case] input: &str, #[case] expected: TagKind) {
        assert_eq!(input.parse::<TagKind>().unwrap(), expected);
    }
}
