//! SQLite access.
//!
//! A single worker thread owns the `rusqlite::Connection`; async callers
//! send it closures over a channel and await the answer on a oneshot.
//! This keeps all SQLite work off the async runtime and makes the process
//! single-writer by construction, so no in-process busy handling is
//! needed.

use std::path::Path;

use rusqlite::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// A unit of work executed on the database thread.
type Job = Box<dyn FnOnce(&mut Connection) + Send>;

/// Handle to the database worker.
///
/// Cheap to clone; all clones share the same connection and worker
/// thread.  The worker exits once every handle is dropped.
#[derive(Clone)]
pub struct Database {
    jobs: mpsc::UnboundedSender<Job>,
}

impl Database {
    /// Open (or create) a database file and start its worker.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");
        Self::start(Connection::open(path)?)
    }

    /// In-memory database — useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");
        Self::start(Connection::open_in_memory()?)
    }

    /// Open the database and bring the schema up to date.
    pub async fn open_and_migrate(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Self::open(path)?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply any pending schema migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.call(|conn| migration::run_all(conn)).await
    }

    /// Run a closure on the database thread and await its result.
    ///
    /// This is the only way to reach the connection.  The closure gets
    /// `&mut Connection`, so `conn.transaction()` works inside it.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, answer) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have given up; nothing to do then.
            let _ = reply.send(f(conn));
        });

        self.jobs
            .send(job)
            .map_err(|_| StoreError::Worker("database worker has shut down".into()))?;
        answer
            .await
            .map_err(|_| StoreError::Worker("database worker dropped the request".into()))?
    }

    /// Configure the connection and hand it to a fresh worker thread.
    fn start(conn: Connection) -> StoreResult<Self> {
        configure(&conn)?;

        let (jobs, mut inbox) = mpsc::unbounded_channel::<Job>();
        std::thread::Builder::new()
            .name("strand-store".into())
            .spawn(move || {
                let mut conn = conn;
                while let Some(job) = inbox.blocking_recv() {
                    job(&mut conn);
                }
                debug!("database worker exiting");
            })
            .map_err(|e| StoreError::Worker(format!("failed to spawn worker: {e}")))?;

        Ok(Self { jobs })
    }
}

/// Connection settings, applied once before the worker takes over.
fn configure(conn: &Connection) -> StoreResult<()> {
    // WAL keeps readers unblocked.  This pragma answers with the resulting
    // mode (in-memory databases report "memory"), so it needs the checked
    // variant.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_row| Ok(()))?;

    // NORMAL is durable enough under WAL for a local chat store.
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // The messages table cascades on conversation delete.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
