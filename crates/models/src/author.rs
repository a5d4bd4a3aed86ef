use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A person credited on an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Author {
    pub name: String,
    pub kind: AuthorKind,
}
impl Author {
    pub fn new(name: impl Into<String>, kind: AuthorKind) -> Self {
        Self { name: name.into(), kind }
    }
    pub fn writer(name: impl Into<String>) -> Self {
        Self::new(name, AuthorKind::Story)
    }
    pub fn artist(name: impl Into<String>) -> Self {
        Self::new(name, AuthorKind::Art)
    }
}
impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.kind {
            AuthorKind::Story => write!(f, "{}", self.name),
            AuthorKind::Art => write!(f, "{} (art)", self.name),
        }
    }
}

/// What an [`Author`] is credited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthorKind {
    #[default]
    Story,
    Art,
}
impl AuthorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorKind::Story => "author",
            AuthorKind::Art => "artist",
        }
    }
}
impl FromStr for AuthorKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "author" | "story" | "writer" => Ok(Self::Story),
            "artist" | "art" | "illustrator" => Ok(Self::Art),
            other => Err(other.to_string()),
        }
    }
}
