/// Water level repository
///
/// Owns the `water_levels` schema and the two operations the rest of the
/// service needs: insert one validated reading, and fetch readings in an
/// inclusive time range. All database access goes through the
/// `ConnectionManager`'s transaction discipline, so a storage failure here
/// costs one operation, never the process.

use crate::db::{ConnectionManager, WorkerId};
use crate::model::{Reading, ReadingError, StorageError};
use chrono::Utc;
use rusqlite::params;
use std::sync::Arc;

const TABLE_NAME: &str = "water_levels";

/// Schema DDL, idempotent by construction (create-if-absent).
fn ddl_statements() -> Vec<String> {
    vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, timestamp INTEGER, value REAL)",
        TABLE_NAME
    )]
}

/// Repository for persisting and retrieving `Reading` rows.
pub struct WaterLevelStore {
    db: Arc<ConnectionManager>,
}

impl WaterLevelStore {
    /// Creates the store and ensures the backing table exists.
    ///
    /// A DDL failure is returned as an error and is fatal to startup:
    /// nothing downstream can work without the table.
    pub fn new(db: Arc<ConnectionManager>, worker: &WorkerId) -> Result<Self, StorageError> {
        let statements = ddl_statements();
        let refs: Vec<&str> = statements.iter().map(String::as_str).collect();
        db.execute_ddl(worker, &refs)?;
        Ok(Self { db })
    }

    /// Validates and inserts one reading inside a single transaction.
    ///
    /// Validation runs before any transaction is opened: an invalid reading
    /// aborts the save with `InvalidReading` and never touches the
    /// database. A storage failure after validation rolls back, is logged
    /// by the connection layer, and degrades to `Ok(false)`.
    pub fn save(&self, worker: &WorkerId, reading: &Reading) -> Result<bool, ReadingError> {
        reading.validate()?;

        let inserted = self.db.execute_transaction(worker, |tx| {
            tx.execute(
                &format!("INSERT INTO {} (timestamp, value) VALUES (?1, ?2)", TABLE_NAME),
                params![reading.timestamp, reading.value],
            )
        });

        Ok(inserted.is_some())
    }

    /// Returns all readings with `start <= timestamp <= end`, both ends
    /// inclusive, ordered by timestamp ascending.
    ///
    /// `start` defaults to the epoch, `end` defaults to "now" at call
    /// time. A query failure degrades to an empty result (already logged
    /// by the connection layer).
    pub fn get_by_range(
        &self,
        worker: &WorkerId,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Vec<Reading> {
        let start = start.unwrap_or(0);
        let end = end.unwrap_or_else(|| Utc::now().timestamp_millis());

        self.db
            .execute_transaction(worker, |tx| {
                let mut stmt = tx.prepare(&format!(
                    "SELECT timestamp, value FROM {} \
                     WHERE timestamp BETWEEN ?1 AND ?2 ORDER BY timestamp ASC",
                    TABLE_NAME
                ))?;
                let rows = stmt.query_map(params![start, end], |row| {
                    Ok(Reading::new(row.get(0)?, row.get(1)?))
                })?;
                rows.collect::<rusqlite::Result<Vec<Reading>>>()
            })
            .unwrap_or_default()
    }

    /// Total number of stored readings, for diagnostics and tests.
    pub fn count(&self, worker: &WorkerId) -> i64 {
        self.db
            .execute_transaction(worker, |tx| {
                tx.query_row(&format!("SELECT COUNT(*) FROM {}", TABLE_NAME), [], |row| {
                    row.get(0)
                })
            })
            .unwrap_or(0)
    }
}
