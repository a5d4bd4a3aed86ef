//! `shelf`: administer the library, the metadata cache and refresh settings.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Args, Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use shelf_cache::{LibraryIndex, MangaCache};
use shelf_config::Config;
use shelf_models::{MangaId, SourceId};
use shelf_store::{PersistentStore, SqliteStore, StoreHandle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use time::UtcDateTime;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shelf", version, about)]
struct Cli {
    /// Configuration file, on top of the platform configuration directory.
    #[arg(long, short, global = true, env = "SHELF_CONFIG")]
    config: Option<PathBuf>,
    /// More output; repeat for more. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Items explicitly added to the library.
    #[command(subcommand)]
    Library(LibraryCommand),
    /// Library items due for a refresh.
    Stale {
        /// Staleness threshold in seconds; defaults to the update frequency.
        #[arg(long)]
        threshold: Option<u64>,
    },
    /// Include or exclude sources from background refresh.
    #[command(subcommand)]
    Source(SourceCommand),
    /// Cached item metadata.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Configuration and per-source refresh state.
    Status,
}

#[derive(Args, Debug)]
struct ItemArgs {
    source: String,
    id: String,
}
impl ItemArgs {
    fn ids(&self) -> (SourceId, MangaId) {
        (SourceId::from(self.source.as_str()), MangaId::from(self.id.as_str()))
    }
}

#[derive(Subcommand, Debug)]
enum LibraryCommand {
    Add(ItemArgs),
    Remove(ItemArgs),
    List { source: Option<String> },
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    Enable { source: String },
    Disable { source: String },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    Show(ItemArgs),
    Remove(ItemArgs),
    /// Drop every cached record.
    Flush,
}

struct App {
    config: Config,
    store: SqliteStore,
    cache: MangaCache,
    library: LibraryIndex,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let app = App::open(config).await?;
    let result = app.dispatch(cli.command).await;
    app.store.close().await;
    result
}

impl App {
    async fn open(config: Config) -> Result<Self> {
        let path = config.store_path().or_raise(|| ErrorKind::Config)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Store)?;
        }
        debug!(path = %path.display(), "opening store");
        let store = SqliteStore::connect(&path).await.or_raise(|| ErrorKind::Store)?;
        let handle: StoreHandle = Arc::new(store.clone());
        let cache = MangaCache::new(handle.clone()).with_default_sources(config.store.default_sources.clone());
        let library = LibraryIndex::new(handle, cache.clone());
        Ok(Self {
            config,
            store,
            cache,
            library,
        })
    }

    async fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Library(command) => self.library(command).await,
            Command::Stale { threshold } => self.stale(threshold).await,
            Command::Source(command) => self.source(command).await,
            Command::Cache(command) => self.cache(command).await,
            Command::Status => self.status().await,
        }
    }

    async fn library(&self, command: LibraryCommand) -> Result<()> {
        match command {
            LibraryCommand::Add(item) => {
                let (source, id) = item.ids();
                match self.library.add_item(&source, &id).await.or_raise(|| ErrorKind::Cache)? {
                    true => info!(source = %source, id = %id, "added to library"),
                    false => println!("{source}/{id} is already in the library"),
                }
            },
            LibraryCommand::Remove(item) => {
                let (source, id) = item.ids();
                if !self.library.remove_item(&source, &id).await.or_raise(|| ErrorKind::Cache)? {
                    println!("{source}/{id} is not in the library");
                }
            },
            LibraryCommand::List { source } => {
                let sources = match source {
                    Some(source) => vec![SourceId::from(source)],
                    None => self.library.sources().await.or_raise(|| ErrorKind::Cache)?.into_keys().collect(),
                };
                for source in sources {
                    for id in self.library.list_items(&source).await.or_raise(|| ErrorKind::Cache)? {
                        let title = self
                            .cache
                            .get(&source, &id)
                            .await
                            .or_raise(|| ErrorKind::Cache)?
                            .map(|record| record.manga.title)
                            .unwrap_or_default();
                        println!("{source}/{id}\t{title}");
                    }
                }
            },
        }
        Ok(())
    }

    async fn stale(&self, threshold: Option<u64>) -> Result<()> {
        let threshold = match threshold {
            Some(seconds) => Duration::from_secs(seconds),
            None => self
                .config
                .library
                .update_frequency
                .interval()
                .ok_or_raise(|| ErrorKind::Usage("updates are manual; pass --threshold"))?,
        };
        let stale = self.library.get_stale(threshold, UtcDateTime::now()).await.or_raise(|| ErrorKind::Cache)?;
        for (source, ids) in stale {
            for id in ids {
                println!("{source}/{id}");
            }
        }
        Ok(())
    }

    async fn source(&self, command: SourceCommand) -> Result<()> {
        let (source, enabled) = match command {
            SourceCommand::Enable { source } => (source, true),
            SourceCommand::Disable { source } => (source, false),
        };
        self.library
            .set_enabled(&SourceId::from(source), enabled)
            .await
            .or_raise(|| ErrorKind::Cache)
    }

    async fn cache(&self, command: CacheCommand) -> Result<()> {
        match command {
            CacheCommand::Show(item) => {
                let (source, id) = item.ids();
                let record = self
                    .cache
                    .get(&source, &id)
                    .await
                    .or_raise(|| ErrorKind::Cache)?
                    .ok_or_raise(|| ErrorKind::Usage("item is not cached"))?;
                let manga = &record.manga;
                println!("{manga}");
                println!("  status:   {}", manga.status);
                let authors = manga.authors.iter().map(ToString::to_string).collect::<Vec<_>>();
                println!("  authors:  {}", authors.join(", "));
                println!("  chapters: {}", manga.chapters.len());
                println!("  fetched:  {}", record.date_fetched);
                if let Some(read) = manga.last_read_at {
                    println!("  read:     {read}");
                }
            },
            CacheCommand::Remove(item) => {
                let (source, id) = item.ids();
                if !self.cache.remove(&source, &id).await.or_raise(|| ErrorKind::Cache)? {
                    println!("{source}/{id} is not cached");
                }
            },
            CacheCommand::Flush => {
                let removed = self.cache.flush().await.or_raise(|| ErrorKind::Cache)?;
                println!("removed {removed} cached documents");
            },
        }
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let library = &self.config.library;
        println!("store:            {}", self.store.name());
        println!("update frequency: {}", library.update_frequency);
        println!("ongoing only:     {}", library.update_ongoing_manga);
        println!("tick:             {}s", self.config.scheduler.tick_seconds);
        println!("fetch timeout:    {}s", self.config.scheduler.fetch_timeout_seconds);
        let last = self.library.last_updated().await.or_raise(|| ErrorKind::Cache)?;
        println!("last updated:     {}", last.map(|t| t.to_string()).unwrap_or_else(|| "never".to_string()));
        for (source, state) in self.library.sources().await.or_raise(|| ErrorKind::Cache)? {
            let enabled = if state.enabled { "enabled" } else { "disabled" };
            println!("  {source}\t{enabled}\t{} items", state.items);
        }
        Ok(())
    }
}
