use std::borrow::Borrow;
use std::fmt::{Display, Formatter, Result as FmtResult};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
            pub fn into_inner(self) -> String {
                self.0
            }
        }
        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a remote catalog (e.g. `"mangadex"`).
    SourceId
);
string_id!(
    /// Identifier of an item, as assigned by its source. Only unique within
    /// that source.
    MangaId
);
string_id!(
    /// Identifier of a chapter, scoped to its parent item.
    ChapterId
);

/// Globally unique, immutable identity of an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MangaKey {
    pub source: SourceId,
    pub id: MangaId,
}
impl MangaKey {
    pub fn new(source: impl Into<SourceId>, id: impl Into<MangaId>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}
impl Display for MangaKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.source, self.id)
    }
}
