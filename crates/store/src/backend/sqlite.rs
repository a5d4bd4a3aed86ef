//! SQLite-backed document store.

use crate::DocPath;
use crate::PersistentStore;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use serde_json::Value;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use time::UtcDateTime;
use tracing::instrument;

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// A refresh pass merges items from every source at once, so a few writers
// can genuinely be in flight.
const MAX_CONNECTIONS: u32 = 5;

/// Document store on top of a SQLite connection pool.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelf_store::{DocPath, PersistentStore, SqliteStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteStore::connect_in_memory().await?;
/// let path = DocPath::root("Library")?.child("Sources")?.child("mangadex")?;
/// store.put(&path, &json!({"Enabled": true})).await?;
/// assert_eq!(store.get(&path).await?, Some(json!({"Enabled": true})));
/// store.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    name: String,
    pool: SqlitePool,
}

impl SqliteStore {
    async fn new(name: String, options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // This is IMPORTANT to apply the query-based PRAGMAs to EVERY
            // connection (set by max connections) instead of only the
            // first connection returned by the pool.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let store = Self { name, pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Connect to the store database at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(path.display().to_string(), options, None).await
    }

    /// Connect to an in-memory database.
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // In-memory database must either use the same cache `.shared_cache(true)`,
        // or be limited to one connection. Otherwise parallel connections will
        // see different databases that contain different data.
        Self::new(":memory:".to_string(), options, Some(1)).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Enable WAL mode for better concurrent read performance
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // PRAGMA synchronous = NORMAL (balance between safety and speed)
            .synchronous(SqliteSynchronous::Normal)
            // PRAGMA busy_timeout = 1500ms
            // Every source of a refresh pass writes at the same time; with
            // only one writer in WAL-mode a small timeout means SQLITE_BUSY.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    ///
    /// This is called automatically by `connect` and `connect_in_memory`.
    #[instrument("performing store migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the store should not be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }

    fn decode_body(body: &str) -> Result<Value> {
        serde_json::from_str(body).or_raise(|| ErrorKind::InvalidData("document body"))
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "trace", skip(self, path), fields(path = %path))]
    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        let body: Option<String> = sqlx::query_scalar(include_str!("../../queries/get_document.sql"))
            .bind(path.namespace())
            .bind(path.encoded())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        body.as_deref().map(Self::decode_body).transpose()
    }

    #[instrument(level = "trace", skip(self, path, document), fields(path = %path))]
    async fn put(&self, path: &DocPath, document: &Value) -> Result<()> {
        let body = serde_json::to_string(document).or_raise(|| ErrorKind::InvalidData("document body"))?;
        sqlx::query(include_str!("../../queries/upsert_document.sql"))
            .bind(path.namespace())
            .bind(path.encoded())
            .bind(body)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self, path), fields(path = %path))]
    async fn delete(&self, path: &DocPath) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/delete_document.sql"))
            .bind(path.namespace())
            .bind(path.encoded())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(level = "trace", skip(self, prefix), fields(prefix = %prefix))]
    async fn list(&self, prefix: &DocPath) -> Result<Vec<(DocPath, Value)>> {
        let descendants = prefix.descendant_prefix();
        let rows: Vec<(String, String)> = sqlx::query_as(include_str!("../../queries/list_documents.sql"))
            .bind(prefix.namespace())
            .bind(descendants.clone())
            .bind(descendants)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter()
            .map(|(path, body)| -> Result<(DocPath, Value)> {
                Ok((DocPath::decode(prefix.namespace(), &path)?, Self::decode_body(&body)?))
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn clear(&self, namespace: &str) -> Result<u64> {
        let result = sqlx::query(include_str!("../../queries/clear_namespace.sql"))
            .bind(namespace)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }
}
