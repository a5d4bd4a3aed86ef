use shelf_models::{Manga, MangaKey};
use std::time::Duration;
use time::UtcDateTime;

/// The fullest known copy of an item, and when it was last fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub manga: Manga,
    /// Set on every successful merge; never moves backwards.
    pub date_fetched: UtcDateTime,
}
impl CacheRecord {
    pub fn key(&self) -> MangaKey {
        self.manga.key()
    }

    /// Whether the record was fetched more than `threshold` before `now`.
    pub fn is_stale(&self, threshold: Duration, now: UtcDateTime) -> bool {
        now - self.date_fetched > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(7200, true)]
    #[case(3601, true)]
    #[case(3600, false)]
    #[case(1800, false)]
    fn test_is_stale(#[case] fetched_seconds_ago: i64, #[case] expected: bool) {
        let now = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let record = CacheRecord {
            manga: Manga::new("mangadex", "a", "A"),
            date_fetched: now - time::Duration::seconds(fetched_seconds_ago),
        };
        assert_eq!(record.is_stale(Duration::from_secs(3600), now), expected);
    }
}
