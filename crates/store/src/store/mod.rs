//! The SQLite-backed record store.

use std::fmt::Debug;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::ResourceCodec;
use crate::error::{BackendError, StoreError, StoreResult};
use crate::index::ResourceIndexer;

mod include;
mod records;
pub mod schema;
mod sync;
mod writer;

pub use include::{
    CompiledQuery, ForwardIncludeMatch, IncludeSpec, QueriedRecord, QueryArg, ReverseIncludeMatch,
};
pub use sync::RemoteBatchEntry;

pub(crate) type PooledConn = PooledConnection<SqliteConnectionManager>;

/// The persistence core: records plus their derived index entries, in one
/// SQLite database.
///
/// The store owns a connection pool and two injected collaborators: a
/// [`ResourceIndexer`] that derives index entries on every write, and a
/// [`ResourceCodec`] that converts records to and from their payload form.
/// All operations are `async` and hop onto blocking threads for the actual
/// SQLite work, so they must be called from within a Tokio runtime.
///
/// Clones are cheap and share the same pool.
#[derive(Clone)]
pub struct ResourceStore {
    pool: Pool<SqliteConnectionManager>,
    config: StoreConfig,
    is_memory: bool,
    // Pins a shared in-memory database for the store's lifetime; pooled
    // connections to it come and go
    _memory_anchor: Option<Arc<Mutex<Connection>>>,
    indexer: Arc<dyn ResourceIndexer>,
    codec: Arc<dyn ResourceCodec>,
}

impl Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the store's SQLite connection pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of connections in the pool. In-memory stores always
    /// use a single connection.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency. Ignored for in-memory
    /// databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

impl ResourceStore {
    /// Creates a new in-memory store, private to this instance.
    ///
    /// In-memory stores run all storage work through a single connection;
    /// concurrent operations queue for it rather than interleave.
    pub fn in_memory(
        indexer: Arc<dyn ResourceIndexer>,
        codec: Arc<dyn ResourceCodec>,
    ) -> StoreResult<Self> {
        Self::with_config(":memory:", StoreConfig::default(), indexer, codec)
    }

    /// Opens or creates a file-based store.
    pub fn open<P: AsRef<Path>>(
        path: P,
        indexer: Arc<dyn ResourceIndexer>,
        codec: Arc<dyn ResourceCodec>,
    ) -> StoreResult<Self> {
        Self::with_config(path, StoreConfig::default(), indexer, codec)
    }

    /// Creates a store with custom pool configuration.
    ///
    /// The schema is created or verified before this returns. For the
    /// `":memory:"` path the configured pool sizes are overridden down to a
    /// single connection.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        mut config: StoreConfig,
        indexer: Arc<dyn ResourceIndexer>,
        codec: Arc<dyn ResourceCodec>,
    ) -> StoreResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";

        // Plain ":memory:" would give every pooled connection its own empty
        // database. A named shared-cache URI keeps them on one database
        // while still isolating separate store instances.
        let database_path = if is_memory {
            format!("file:store-{}?mode=memory&cache=shared", Uuid::new_v4())
        } else {
            path_str.into_owned()
        };

        let memory_anchor = if is_memory {
            let conn = Connection::open(&database_path)
                .map_err(|err| StoreError::Backend(BackendError::Sqlite(err)))?;
            Some(Arc::new(Mutex::new(conn)))
        } else {
            None
        };

        // Table locks between connections sharing an in-memory cache fail
        // with SQLITE_LOCKED immediately, bypassing the busy timeout, so all
        // storage work goes through one connection and checkouts queue
        // within the connection timeout instead.
        if is_memory {
            config.max_connections = 1;
            config.min_connections = 1;
        }

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let enable_wal = config.enable_wal && !is_memory;
        let manager =
            SqliteConnectionManager::file(&database_path).with_init(move |conn| {
                // Cascades from record rows to index rows depend on foreign
                // key enforcement, which SQLite scopes per connection
                conn.busy_timeout(busy_timeout)?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                if enable_wal {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)?;

        let store = Self {
            pool,
            config,
            is_memory,
            _memory_anchor: memory_anchor,
            indexer,
            codec,
        };

        let conn = store.connection()?;
        schema::initialize_schema(&conn)?;
        tracing::debug!(path = %database_path, "opened resource store");

        Ok(store)
    }

    /// Whether this store lives in memory only.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// The pool configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get a connection from the pool.
    pub(crate) fn connection(&self) -> StoreResult<PooledConn> {
        Ok(self.pool.get()?)
    }
}

pub(crate) fn corrupt_row(message: String) -> StoreError {
    StoreError::Backend(BackendError::CorruptRow { message })
}

/// Runs a storage closure on the blocking thread pool.
///
/// SQLite work is synchronous; this is the single point where async
/// operations hand off to it. Cancelling the returned future abandons the
/// result but never interrupts SQLite mid-statement.
pub(crate) async fn run_blocking<T, F>(func: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(func)
        .await
        .map_err(|err| {
            StoreError::Backend(BackendError::TaskJoin {
                message: err.to_string(),
            })
        })?
}
