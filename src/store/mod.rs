//! Relational store for subjects, samples, cell counts, and derived frequencies.
//!
//! A [`Store`] wraps a single SQLite connection. It is opened once at the start
//! of a pipeline run, passed explicitly to every step, and closed at the end:
//!
//! - [`schema`]: idempotent creation (and teardown) of the tables
//! - [`loader`]: ingestion of cell count records
//! - [`frequency`]: the derived per-sample frequency table
//! - [`cohort`]: the reusable cohort predicate and the views built on it

pub mod cohort;
pub mod frequency;
pub mod loader;
pub mod schema;

use crate::error::{FreqError, Result};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};

pub use cohort::CohortFilter;
pub use frequency::{
    build_frequency_summary, drop_frequency_summary, percentage, read_frequency_summary,
    rebuild_frequency_summary, FrequencyBuild, ZeroTotalPolicy,
};
pub use loader::{load_file, load_records, LoadSummary};
pub use schema::{clear, create_schema};

/// Tables managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Subjects,
    Samples,
    CellCounts,
    FrequencySummary,
}

impl Table {
    /// SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subjects => "cell_subjects",
            Self::Samples => "cell_samples",
            Self::CellCounts => "cell_counts",
            Self::FrequencySummary => "frequency_summary",
        }
    }
}

/// Handle to an open SQLite database.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(FreqError::during("open database"))?;
        Self::configure(&conn)?;
        tracing::debug!(path = %path.display(), "opened store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(FreqError::during("open database"))?;
        Self::configure(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(FreqError::during("enable foreign keys"))
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn transaction(&mut self, operation: &str) -> Result<Transaction<'_>> {
        self.conn
            .transaction()
            .map_err(FreqError::during(operation))
    }

    /// Check whether a table exists.
    pub fn table_exists(&self, table: Table) -> Result<bool> {
        table_exists(&self.conn, table)
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: Table) -> Result<u64> {
        if !self.table_exists(table)? {
            return Err(FreqError::MissingTable(table.name().to_string()));
        }
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(FreqError::during("count rows"))
    }

    /// Close the connection, flushing any pending state.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| FreqError::storage("close database", e))
    }
}

pub(crate) fn table_exists(conn: &Connection, table: Table) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table.name()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(FreqError::during("inspect schema"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_file_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cells.db");

        let store = Store::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(!store.table_exists(Table::Subjects).unwrap());
        store.close().unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let store = Store::open_in_memory().unwrap();
        let enabled: bool = store
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn test_row_count_missing_table() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.row_count(Table::FrequencySummary),
            Err(FreqError::MissingTable(_))
        ));
    }
}
