//! # Database Pool Management
//!
//! Connection pool creation, configuration and per-request sessions.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Server startup                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── db.read()  ──► Session (plain connection, many at once)      │
//! │       └── db.begin() ──► Session (transaction + write lock, one)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## One Writer
//! SQLite allows a single writer. A deferred transaction that reads first and
//! writes later can fail with `SQLITE_BUSY` when another writer got there in
//! between, so write sessions queue on an in-process lock before `BEGIN`.
//! Every read a document operation makes (stock on hand, duplicate check)
//! therefore sees the state it will write against.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::company::CompanyRepository;
use crate::repository::lookup::LookupRepository;
use crate::repository::medicine::MedicineRepository;
use crate::repository::party::{NamedPartyRepository, PatientRepository, SupplierRepository};
use crate::repository::user::UserRepository;
use pharma_core::{Customer, Doctor, PaymentMethod, Unit};

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("./pos_test.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections
    /// forever (required for in-memory databases).
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// How long a statement waits on a locked database.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// A single connection that never expires: every connection to
    /// `:memory:` is its own database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// True when this configuration points at an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                // WAL: readers don't block the writer
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has foreign keys disabled by default
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle. Cheap to clone; shared through the server state.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Serialises write sessions.
    write_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, foreign keys, busy timeout
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = config.connect_options()?;
        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);
        if config.is_memory() {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a read session on a plain pooled connection.
    pub async fn read(&self) -> DbResult<Session> {
        let conn = self.pool.acquire().await?;
        Ok(Session {
            conn: SessionConn::Read(conn),
            _write: None,
        })
    }

    /// Opens a write session: waits for the write lock, then `BEGIN`s.
    ///
    /// Dropping the session without [`Session::commit`] rolls back.
    pub async fn begin(&self) -> DbResult<Session> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(Session {
            conn: SessionConn::Write(tx),
            _write: Some(guard),
        })
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Session
// =============================================================================

enum SessionConn {
    Read(PoolConnection<Sqlite>),
    Write(Transaction<'static, Sqlite>),
}

/// One request's view of the database.
///
/// ## Usage
/// ```rust,ignore
/// let mut session = db.begin().await?;
/// let unit = session.units().upsert("BOX").await?;
/// session.medicines().adjust_stock(id, -30.0, false, actor).await?;
/// session.commit().await?;
/// ```
pub struct Session {
    // Field order matters: the connection (and its rollback) goes before the
    // write lock is released.
    conn: SessionConn,
    _write: Option<OwnedMutexGuard<()>>,
}

impl Session {
    /// The underlying connection, for repositories that take one directly.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        match &mut self.conn {
            SessionConn::Read(conn) => &mut **conn,
            SessionConn::Write(tx) => &mut **tx,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self.conn, SessionConn::Write(_))
    }

    /// Commits a write session. A read session has nothing to commit.
    pub async fn commit(self) -> DbResult<()> {
        match self.conn {
            SessionConn::Read(_) => Ok(()),
            SessionConn::Write(tx) => tx
                .commit()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string())),
        }
    }

    pub fn users(&mut self) -> UserRepository<'_> {
        UserRepository::new(self.conn())
    }

    pub fn units(&mut self) -> LookupRepository<'_, Unit> {
        LookupRepository::new(self.conn())
    }

    pub fn payment_methods(&mut self) -> LookupRepository<'_, PaymentMethod> {
        LookupRepository::new(self.conn())
    }

    pub fn customers(&mut self) -> NamedPartyRepository<'_, Customer> {
        NamedPartyRepository::new(self.conn())
    }

    pub fn doctors(&mut self) -> NamedPartyRepository<'_, Doctor> {
        NamedPartyRepository::new(self.conn())
    }

    pub fn patients(&mut self) -> PatientRepository<'_> {
        PatientRepository::new(self.conn())
    }

    pub fn suppliers(&mut self) -> SupplierRepository<'_> {
        SupplierRepository::new(self.conn())
    }

    pub fn company(&mut self) -> CompanyRepository<'_> {
        CompanyRepository::new(self.conn())
    }

    pub fn medicines(&mut self) -> MedicineRepository<'_> {
        MedicineRepository::new(self.conn())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.is_memory());
        assert!(DbConfig::in_memory().is_memory());
    }

    #[tokio::test]
    async fn test_dropped_session_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut session = db.begin().await.unwrap();
            session.units().upsert("BOX").await.unwrap();
        }

        let mut session = db.read().await.unwrap();
        assert!(session.units().get_by_name("BOX").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committed_session_persists() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut session = db.begin().await.unwrap();
        assert!(session.is_write());
        session.units().upsert("BOX").await.unwrap();
        session.commit().await.unwrap();

        let mut session = db.read().await.unwrap();
        assert!(session.units().get_by_name("box").await.unwrap().is_some());
    }
}
