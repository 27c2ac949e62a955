//! Database layer for the task manager.

pub mod directory;
pub mod tasks;

use crate::error::{TaskError, TaskResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Default time SQLite waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> TaskResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Open or create the database with an explicit busy timeout.
    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout_ms: u32) -> TaskResult<Self> {
        let conn = Connection::open(path.as_ref())?;

        // WAL lets readers see either the old or the new row set, never a partial write
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout={};",
            busy_timeout_ms
        ))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;
        debug!(path = %path.as_ref().display(), "Database opened");

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> TaskResult<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> TaskResult<()> {
        let mut conn = self.lock()?;
        let report = embedded::migrations::runner().run(&mut *conn)?;
        for migration in report.applied_migrations() {
            debug!(version = migration.version(), name = %migration.name(), "Applied migration");
        }
        Ok(())
    }

    fn lock(&self) -> TaskResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TaskError::storage("database connection mutex poisoned"))
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> TaskResult<T>
    where
        F: FnOnce(&Connection) -> TaskResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> TaskResult<T>
    where
        F: FnOnce(&mut Connection) -> TaskResult<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn)
    }
}
