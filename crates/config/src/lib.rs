//! Configuration for shelf.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults,
//! 2. `config.toml`, `config.yaml` and `config.json` in the platform config
//!    directory,
//! 3. an explicitly requested file (format chosen by extension),
//! 4. `SHELF_`-prefixed environment variables, with `__` separating nesting
//!    levels (`SHELF_LIBRARY__UPDATEFREQUENCY=manual`).

pub mod error;
mod frequency;

pub use crate::frequency::UpdateFrequency;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const ENV_PREFIX: &str = "SHELF_";
const STORE_FILENAME: &str = "shelf.sqlite";
/// Every leaf key, so that lower-cased environment variable names can be
/// mapped back onto the camelCase keys used everywhere else.
const KEYS: &[&str] = &[
    "library.updateFrequency",
    "library.updateOngoingManga",
    "scheduler.tickSeconds",
    "scheduler.fetchTimeoutSeconds",
    "store.path",
    "store.defaultSources",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub library: LibrarySettings,
    pub scheduler: SchedulerSettings,
    pub store: StoreSettings,
}

/// The two settings the refresh scheduler reads on every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LibrarySettings {
    pub update_frequency: UpdateFrequency,
    /// Only refresh items whose publication status is "ongoing".
    pub update_ongoing_manga: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerSettings {
    /// Fixed cadence at which staleness is checked. Independent of the update
    /// frequency, which only decides whether a tick does anything.
    pub tick_seconds: u64,
    /// Upper bound on a single item fetch, so one hung request cannot hold a
    /// refresh pass open indefinitely.
    pub fetch_timeout_seconds: u64,
}
impl SchedulerSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}
impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            fetch_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSettings {
    /// SQLite database file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
    /// Sources that get an empty cache entry again after the cache is flushed.
    pub default_sources: Vec<String>,
}
impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            default_sources: vec!["mangadex".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from every source, including the platform config
    /// directory and the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let dirs = Self::project_dirs();
        Self::figment(dirs.as_ref().map(|d| d.config_dir()), explicit)
            .extract::<Config>()
            .or_raise(|| ErrorKind::Load)?
            .validated()
    }

    /// The layered [`Figment`] that [`load`](Self::load) extracts from.
    pub fn figment(config_dir: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = config_dir {
            debug!(dir = %dir.display(), "reading configuration directory");
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(file) = explicit {
            debug!(file = %file.display(), "reading configuration file");
            figment = match file.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        let env = Env::prefixed(ENV_PREFIX).split("__").map(|key| {
            match KEYS.iter().find(|known| known.eq_ignore_ascii_case(key.as_str())) {
                Some(known) => (*known).into(),
                None => key.as_str().to_string().into(),
            }
        });
        figment.merge(env)
    }

    fn validated(self) -> Result<Self> {
        if self.scheduler.tick_seconds == 0 {
            exn::bail!(ErrorKind::InvalidValue("scheduler.tickSeconds"));
        }
        if self.scheduler.fetch_timeout_seconds == 0 {
            exn::bail!(ErrorKind::InvalidValue("scheduler.fetchTimeoutSeconds"));
        }
        if self.store.default_sources.iter().any(|s| s.trim().is_empty()) {
            exn::bail!(ErrorKind::InvalidValue("store.defaultSources"));
        }
        Ok(self)
    }

    /// Where the store database lives: the configured path, or
    /// `shelf.sqlite` in the platform data directory.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store.path {
            return Ok(path.clone());
        }
        let dirs = Self::project_dirs().ok_or_raise(|| ErrorKind::NoHomeDirectory)?;
        Ok(dirs.data_dir().join(STORE_FILENAME))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "shelf")
    }
}
