/// Database connection management
///
/// SQLite connections are cheap but not shareable across threads, so each
/// long-lived worker (measurement loop, HTTP endpoint, main) gets its own
/// lazily opened connection, keyed by an explicit `WorkerId` token rather
/// than ambient thread-local discovery. The manager owns the key → connection
/// table; the table itself is the only piece of cross-worker shared state
/// and is guarded by a mutex. Transactions commit on success and roll back
/// on any storage error, degrading the operation to a no-op instead of
/// crashing the caller.

use crate::model::StorageError;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Identity token for a worker of execution.
///
/// Each concurrent worker passes its own token through to the storage
/// layer; two workers must never share one. Tokens are plain names
/// ("monitor", "endpoint", "main"), which keeps connection ownership
/// visible in logs and in the manager's table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns one SQLite connection per worker, all against the same file.
pub struct ConnectionManager {
    db_path: PathBuf,
    connections: Mutex<HashMap<WorkerId, Arc<Mutex<Connection>>>>,
}

impl ConnectionManager {
    /// Creates a manager for the given database file. No connection is
    /// opened yet; each worker's connection is created on first use.
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the calling worker's connection, opening and registering a
    /// new one if this worker has none yet (including after `close`).
    ///
    /// Distinct workers always receive distinct connection instances; the
    /// map lock is held only for the lookup, never across a transaction.
    pub fn get_connection(
        &self,
        worker: &WorkerId,
    ) -> Result<Arc<Mutex<Connection>>, StorageError> {
        let mut table = self.connections.lock().expect("connection table poisoned");

        if let Some(conn) = table.get(worker) {
            return Ok(Arc::clone(conn));
        }

        let conn = Connection::open(&self.db_path).map_err(StorageError::ConnectionFailed)?;
        let conn = Arc::new(Mutex::new(conn));
        table.insert(worker.clone(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Runs schema DDL statements in order on the calling worker's
    /// connection. Used only at startup; a failure here is fatal because
    /// the service cannot operate without its schema.
    pub fn execute_ddl(&self, worker: &WorkerId, statements: &[&str]) -> Result<(), StorageError> {
        let conn = self.get_connection(worker)?;
        let conn = conn.lock().expect("connection poisoned");

        for sql in statements {
            conn.execute(sql, [])
                .map_err(StorageError::InitializationFailed)?;
        }
        Ok(())
    }

    /// Runs `work` inside one transaction on the calling worker's
    /// connection: commit on success, roll back on any storage error.
    ///
    /// A failed transaction is logged and surfaced as `None` - one degraded
    /// operation, never a crash. This is what lets a transient storage
    /// error cost the measurement loop a single cycle at most.
    pub fn execute_transaction<R>(
        &self,
        worker: &WorkerId,
        work: impl FnOnce(&rusqlite::Transaction) -> rusqlite::Result<R>,
    ) -> Option<R> {
        let conn = match self.get_connection(worker) {
            Ok(conn) => conn,
            Err(e) => {
                eprintln!("[db] {} could not get a connection: {}", worker, e);
                return None;
            }
        };

        let mut conn = conn.lock().expect("connection poisoned");

        let result = conn.transaction().and_then(|tx| {
            let value = work(&tx)?;
            tx.commit()?;
            Ok(value)
        });

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                // Dropping an uncommitted rusqlite transaction rolls it back
                eprintln!("[db] transaction on {} rolled back: {}", worker, e);
                None
            }
        }
    }

    /// Closes and evicts the given worker's connection. A later
    /// `get_connection` for the same worker transparently re-opens.
    pub fn close(&self, worker: &WorkerId) {
        let mut table = self.connections.lock().expect("connection table poisoned");
        table.remove(worker);
    }

    /// Closes and evicts every tracked connection. Iterates over a drained
    /// snapshot of the table so no entry is mutated mid-iteration. Used at
    /// shutdown, after the measurement loop has stopped.
    pub fn close_all(&self) {
        let mut table = self.connections.lock().expect("connection table poisoned");
        let snapshot: Vec<(WorkerId, Arc<Mutex<Connection>>)> = table.drain().collect();
        drop(table);

        for (worker, conn) in snapshot {
            // The connection closes when the last Arc drops; a worker still
            // mid-operation keeps it alive until that operation finishes.
            drop(conn);
            println!("[db] closed connection for {}", worker);
        }
    }

    /// Number of currently tracked connections.
    pub fn open_connections(&self) -> usize {
        self.connections.lock().expect("connection table poisoned").len()
    }
}
