//! Database access layer with connection pooling and migrations
//!
//! Organized by domain:
//! - `transactions` - imported feed rows
//! - `registry` - curated merchant registry
//! - `patterns` - persisted detection results
//! - `overrides` - user/admin override constraints

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod overrides;
mod patterns;
mod registry;
mod transactions;

pub use transactions::TransactionInsertResult;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS"
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (creating if needed) a database at the given path and run
    /// migrations.
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway in-memory database (for testing)
    ///
    /// Uses a named shared-cache URI rather than `:memory:` because each
    /// pooled connection would otherwise see its own empty database. The
    /// name is unique per call so parallel tests stay isolated, and the
    /// database vanishes with the pool; nothing touches disk.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let uri = format!(
            "file:cadence_mem_{}_{}?mode=memory&cache=shared",
            std::process::id(),
            id
        );

        Self::new(&uri)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            -- Synchronous NORMAL: safe for most power-loss scenarios
            PRAGMA synchronous = NORMAL;

            PRAGMA temp_store = MEMORY;

            -- Imported feed transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                date DATE NOT NULL,
                description TEXT NOT NULL,
                merchant TEXT,
                amount REAL NOT NULL,
                kind TEXT NOT NULL,
                category TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_kind ON transactions(kind);

            -- Curated merchant registry
            CREATE TABLE IF NOT EXISTS merchant_registry (
                id INTEGER PRIMARY KEY,
                merchant_name TEXT NOT NULL,
                normalized_name TEXT NOT NULL UNIQUE,
                category TEXT,
                kind TEXT NOT NULL DEFAULT 'subscription',
                patterns TEXT NOT NULL DEFAULT '[]',       -- JSON array of match strings
                confidence REAL,
                logo_url TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_registry_kind ON merchant_registry(kind);

            -- Detected recurring patterns
            CREATE TABLE IF NOT EXISTS recurring_patterns (
                id INTEGER PRIMARY KEY,
                merchant_name TEXT NOT NULL,
                normalized_key TEXT NOT NULL,
                category TEXT,
                kind TEXT NOT NULL,
                frequency TEXT,
                avg_amount REAL NOT NULL,
                amount_variance REAL NOT NULL DEFAULT 0,
                occurrences INTEGER NOT NULL,
                confidence REAL NOT NULL,
                mixed_pattern BOOLEAN NOT NULL DEFAULT 0,
                last_transaction_date DATE NOT NULL,
                next_due_date DATE,
                exclude_from_bills BOOLEAN NOT NULL DEFAULT 0,
                linked_transaction_ids TEXT NOT NULL DEFAULT '[]',  -- JSON array of feed ids
                auto_detected BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_patterns_key ON recurring_patterns(normalized_key);
            CREATE INDEX IF NOT EXISTS idx_patterns_next_due ON recurring_patterns(next_due_date);
            CREATE INDEX IF NOT EXISTS idx_patterns_auto ON recurring_patterns(auto_detected);

            -- Override constraints applied to every detection run
            CREATE TABLE IF NOT EXISTS overrides (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                merchant_key TEXT NOT NULL,
                transaction_id TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- One override per (kind, merchant, transaction) triple;
            -- the empty string stands in for NULL transaction ids so the
            -- uniqueness holds for merchant-level overrides too
            CREATE UNIQUE INDEX IF NOT EXISTS idx_overrides_unique
                ON overrides(kind, merchant_key, COALESCE(transaction_id, ''));
            CREATE INDEX IF NOT EXISTS idx_overrides_merchant ON overrides(merchant_key);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
