//! Persisted document shapes.
//!
//! Domain types never touch the store directly: each is converted to and from
//! a serde "doc" type here. Timestamps are persisted as epoch milliseconds.

mod library;
mod record;

pub(crate) use self::library::SourceDoc;
pub(crate) use self::record::RecordDoc;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

const NANOS_PER_MILLI: i128 = 1_000_000;

pub(crate) fn to_millis(timestamp: UtcDateTime) -> Result<i64> {
    i64::try_from(timestamp.unix_timestamp_nanos() / NANOS_PER_MILLI).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn from_millis(millis: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
        .or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn opt_to_millis(timestamp: Option<UtcDateTime>) -> Result<Option<i64>> {
    timestamp.map(to_millis).transpose()
}

pub(crate) fn opt_from_millis(millis: Option<i64>) -> Result<Option<UtcDateTime>> {
    millis.map(from_millis).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1_700_000_000_123)]
    #[case(-86_400_000)]
    fn test_millis_are_preserved(#[case] millis: i64) {
        assert_eq!(to_millis(from_millis(millis).unwrap()).unwrap(), millis);
    }

    #[test]
    fn test_sub_millisecond_precision_is_truncated() {
        let timestamp = UtcDateTime::from_unix_timestamp_nanos(1_500_999_999).unwrap();
        assert_eq!(to_millis(timestamp).unwrap(), 1_500);
    }
}
