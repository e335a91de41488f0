pub mod memory;
pub mod migrations;
pub mod queries;

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use paste_types::models::{ConsumedPaste, NewPaste};

pub use memory::MemoryStore;

const DEFAULT_POOL_SIZE: usize = 4;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("paste id already exists")]
    DuplicateId,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection lock poisoned")]
    LockPoisoned,
    #[error("corrupt paste row: {0}")]
    CorruptRow(String),
}

/// Durable paste storage.
///
/// `consume` must check visibility and charge the view as one indivisible
/// operation against the backing store. Implementations never split it into
/// a read followed by a write.
pub trait PasteStore: Send + Sync {
    /// Insert a new paste. An existing id is never overwritten.
    fn create(&self, paste: &NewPaste) -> Result<(), StoreError>;

    /// Charge one view if the paste is visible at `now`. `None` covers a
    /// missing, expired or exhausted paste, and nothing is mutated.
    fn consume(&self, id: &str, now: DateTime<Utc>) -> Result<Option<ConsumedPaste>, StoreError>;

    fn health_check(&self) -> Result<(), StoreError>;

    /// Delete pastes that are no longer visible at `now`.
    fn purge_inert(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone, Copy)]
pub struct DbOptions {
    pub pool_size: usize,
    pub busy_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// SQLite-backed paste store.
///
/// Holds a small pool of read-write connections handed out round-robin.
/// Each mutex only guards its own connection; writers on different
/// connections are serialized by SQLite's database lock.
pub struct Database {
    conns: Vec<Mutex<Connection>>,
    next_conn: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with(path, DbOptions::default())
    }

    pub fn open_with(path: &Path, options: DbOptions) -> Result<Self, StoreError> {
        let pool_size = options.pool_size.max(1);

        let first = Connection::open(path)?;
        first.busy_timeout(options.busy_timeout)?;
        // WAL mode for concurrent reads
        let mode: String = first.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        first.execute_batch("PRAGMA synchronous = NORMAL;")?;

        migrations::run(&first)?;

        let mut conns = Vec::with_capacity(pool_size);
        conns.push(Mutex::new(first));
        for _ in 1..pool_size {
            let conn = Connection::open(path)?;
            conn.busy_timeout(options.busy_timeout)?;
            conns.push(Mutex::new(conn));
        }

        info!(
            "Paste DB opened at {} ({} connections, journal_mode={})",
            path.display(),
            pool_size,
            mode
        );
        Ok(Self {
            conns,
            next_conn: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let idx = self.next_conn.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let conn = self.conns[idx]
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Fold the WAL back into the main database file. Called once the
    /// server has drained its requests.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            Ok(())
        })?;
        info!("Paste DB checkpointed");
        Ok(())
    }
}
