use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

const MANUAL: &str = "manual";

/// How often library items are refreshed in the background.
///
/// Persisted as either the string `"manual"` or a number of seconds (written
/// as a number or a numeric string, settings stores disagree on which).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "RawFrequency", into = "RawFrequency")]
pub enum UpdateFrequency {
    /// Never refresh on a timer; only explicit requests refresh items.
    Manual,
    Every(Duration),
}
impl UpdateFrequency {
    pub fn every_seconds(seconds: u64) -> Self {
        Self::Every(Duration::from_secs(seconds))
    }

    pub fn interval(&self) -> Option<Duration> {
        match self {
            UpdateFrequency::Manual => None,
            UpdateFrequency::Every(interval) => Some(*interval),
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, UpdateFrequency::Manual)
    }
}
impl Default for UpdateFrequency {
    fn default() -> Self {
        Self::every_seconds(24 * 60 * 60)
    }
}
impl FromStr for UpdateFrequency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(MANUAL) {
            return Ok(Self::Manual);
        }
        match s.parse::<u64>() {
            Ok(0) => Err("update frequency must be at least one second".to_string()),
            Ok(seconds) => Ok(Self::every_seconds(seconds)),
            Err(_) => Err(format!("expected \"{MANUAL}\" or a number of seconds, found {s:?}")),
        }
    }
}
impl Display for UpdateFrequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UpdateFrequency::Manual => f.write_str(MANUAL),
            UpdateFrequency::Every(interval) => write!(f, "{}", interval.as_secs()),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum RawFrequency {
    Seconds(u64),
    Text(String),
}
impl TryFrom<RawFrequency> for UpdateFrequency {
    type Error = String;
    fn try_from(raw: RawFrequency) -> Result<Self, Self::Error> {
        match raw {
            RawFrequency::Seconds(0) => Err("update frequency must be at least one second".to_string()),
            RawFrequency::Seconds(seconds) => Ok(Self::every_seconds(seconds)),
            RawFrequency::Text(text) => text.parse(),
        }
    }
}
impl From<UpdateFrequency> for RawFrequency {
    fn from(frequency: UpdateFrequency) -> Self {
        match frequency {
            UpdateFrequency::Manual => RawFrequency::Text(MANUAL.to_string()),
            UpdateFrequency::Every(interval) => RawFrequency::Text(interval.as_secs().to_string()),
        }
    }
}
