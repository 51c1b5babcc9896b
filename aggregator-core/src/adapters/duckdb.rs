//! DuckDB database handle

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use duckdb::Connection;

use crate::domain::result::{Error, Result};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Shared handle to a single DuckDB connection.
///
/// The handle outlives every service using it; opening and closing it is the
/// owner's business. Once closed, every operation fails with
/// [`Error::DatabaseClosed`] without touching the database.
pub struct Database {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff on file locking errors, which show up
    /// when another process holds the file during startup.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(Some(conn)),
                        path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            path = %db_path.display(),
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            "database busy, retrying in {}ms: {}",
                            delay.as_millis(),
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::config(format!("failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Cached extensions in ~/.duckdb/extensions are never loaded implicitly
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// File backing the database, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Close the connection. Closing twice is a no-op.
    ///
    /// If DuckDB refuses to close, the connection stays open and usable.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock();
        if let Some(conn) = guard.take() {
            if let Err((conn, e)) = conn.close() {
                *guard = Some(conn);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Run `f` against the live connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(Error::DatabaseClosed)?;
        f(conn)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panicking step has its transaction rolled back before the unwind
        // reaches this guard, so the connection behind a poisoned lock is intact.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
