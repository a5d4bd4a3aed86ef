//! Hierarchical document paths.
//!
//! Every document lives in a namespace (`"Library"`, `"CachedManga"`, ...)
//! under a path of free-form segments (`Sources` → source id → item id). Item
//! ids come from remote catalogs and can contain anything, so segments are
//! percent-escaped before being joined into the flat key a backend stores.

use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};

const SEPARATOR: char = '/';

/// A validated path to a document.
///
/// # Examples
///
/// ```
/// use shelf_store::DocPath;
///
/// let path = DocPath::root("CachedManga")?.child("Sources")?.child("mangadex")?.child("a/b")?;
/// assert_eq!(path.namespace(), "CachedManga");
/// assert_eq!(path.segments().last().map(String::as_str), Some("a/b"));
/// assert!(DocPath::root("CachedManga")?.child("").is_err());
/// # Ok::<(), shelf_store::error::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    namespace: String,
    segments: Vec<String>,
}
impl DocPath {
    /// The root of a namespace. Namespaces are identifiers, not user data:
    /// ASCII alphanumerics, `-` and `_` only.
    pub fn root(namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let valid = !namespace.is_empty()
            && namespace.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            exn::bail!(ErrorKind::InvalidPath(namespace));
        }
        Ok(Self { namespace, segments: vec![] })
    }

    /// A path one level below this one.
    pub fn child(&self, segment: impl AsRef<str>) -> Result<Self> {
        let segment = validate_segment(segment.as_ref())?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self {
            namespace: self.namespace.clone(),
            segments,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `other` is strictly below this path.
    pub fn is_ancestor_of(&self, other: &DocPath) -> bool {
        self.namespace == other.namespace
            && other.segments.len() > self.segments.len()
            && other.segments.starts_with(&self.segments)
    }

    /// Flat key stored by backends.
    pub(crate) fn encoded(&self) -> String {
        self.segments.iter().map(|s| escape(s)).collect::<Vec<_>>().join("/")
    }

    /// Key prefix shared by every descendant of this path (and nothing else).
    pub(crate) fn descendant_prefix(&self) -> String {
        match self.is_root() {
            true => String::new(),
            false => format!("{}{SEPARATOR}", self.encoded()),
        }
    }

    /// Inverse of [`encoded`](Self::encoded).
    pub(crate) fn decode(namespace: &str, encoded: &str) -> Result<Self> {
        let mut path = Self::root(namespace)?;
        if encoded.is_empty() {
            return Ok(path);
        }
        for raw in encoded.split(SEPARATOR) {
            let segment = unescape(raw).ok_or_else(|| exn::Exn::from(ErrorKind::InvalidPath(encoded.to_string())))?;
            path = path.child(segment)?;
        }
        Ok(path)
    }
}
impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.namespace, self.segments.join("."))
    }
}

fn validate_segment(segment: &str) -> Result<&str> {
    // Null bytes are rejected for the same reason as file paths: too many
    // C-backed layers underneath truncate at them.
    if segment.trim().is_empty() || segment.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(segment.to_string()));
    }
    Ok(segment)
}

fn escape(segment: &str) -> String {
    segment.replace('%', "%25").replace(SEPARATOR, "%2F")
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        match rest.get(idx + 1..idx + 3) {
            Some("25") => out.push('%'),
            Some("2F") => out.push(SEPARATOR),
            _ => return None,
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn path(segments: &[&str]) -> DocPath {
        segments.iter().fold(DocPath::root("Test").unwrap(), |p, s| p.child(s).unwrap())
    }

    #[rstest]
    #[case("Library")]
    #[case("Cached_Manga-2")]
    fn test_valid_namespaces(#[case] namespace: &str) {
        assert!(DocPath::root(namespace).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("a/b")]
    #[case("with space")]
    #[case("dotted.name")]
    fn test_invalid_namespaces(#[case] namespace: &str) {
        assert!(DocPath::root(namespace).is_err());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("a\0b")]
    fn test_invalid_segments(#[case] segment: &str) {
        assert!(DocPath::root("Test").unwrap().child(segment).is_err());
    }

    #[rstest]
    #[case(&["Sources", "mangadex", "abc"], "Sources/mangadex/abc")]
    #[case(&["Sources", "site", "series/42"], "Sources/site/series%2F42")]
    #[case(&["Sources", "site", "100%"], "Sources/site/100%25")]
    #[case(&["Sources", "site", "%2F"], "Sources/site/%252F")]
    fn test_encoding(#[case] segments: &[&str], #[case] expected: &str) {
        let original = path(segments);
        let encoded = original.encoded();
        assert_eq!(encoded, expected);
        assert_eq!(DocPath::decode("Test", &encoded).unwrap(), original);
    }

    #[test]
    fn test_decode_rejects_bad_escapes() {
        assert!(DocPath::decode("Test", "Sources/%zz").is_err());
        assert!(DocPath::decode("Test", "Sources/trailing%").is_err());
    }

    #[test]
    fn test_descendant_prefix_excludes_siblings() {
        let parent = path(&["Sources", "md"]);
        let child = path(&["Sources", "md", "x"]);
        let sibling = path(&["Sources", "mdx", "y"]);
        assert!(child.encoded().starts_with(&parent.descendant_prefix()));
        assert!(!sibling.encoded().starts_with(&parent.descendant_prefix()));
        assert!(parent.is_ancestor_of(&child));
        assert!(!parent.is_ancestor_of(&sibling));
        assert!(!parent.is_ancestor_of(&parent));
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        assert_eq!(DocPath::root("Test").unwrap().descendant_prefix(), "");
    }
}
