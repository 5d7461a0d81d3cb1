//! Ingestion of cell count records into the base tables.
//!
//! Loading runs in three phases, each in its own transaction:
//!
//! 1. Insert-or-ignore one subject per subject label
//! 2. Resolve each row's subject id and insert-or-ignore its sample
//! 3. Reshape the wide count columns to (sample, cell_type, count) rows and
//!    insert-or-ignore them
//!
//! A failure in one phase rolls back that phase only. Phases that already
//! committed stay in place.

use super::Store;
use crate::data::{read_records, CellCountRecord};
use crate::error::{FreqError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of rows read and inserted by a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Records read from the input.
    pub records: usize,
    /// New subject rows (existing labels are ignored).
    pub subjects_inserted: usize,
    /// New sample rows.
    pub samples_inserted: usize,
    /// New cell count rows.
    pub counts_inserted: usize,
}

impl std::fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Load Summary")?;
        writeln!(f, "  Records read:      {}", self.records)?;
        writeln!(f, "  Subjects inserted: {}", self.subjects_inserted)?;
        writeln!(f, "  Samples inserted:  {}", self.samples_inserted)?;
        writeln!(f, "  Counts inserted:   {}", self.counts_inserted)?;
        Ok(())
    }
}

/// Read a cell count file and load it into the store.
pub fn load_file<P: AsRef<Path>>(store: &mut Store, path: P) -> Result<LoadSummary> {
    let records = read_records(path)?;
    load_records(store, &records)
}

/// Load records into the store. Safe to repeat: reloading inserts nothing.
pub fn load_records(store: &mut Store, records: &[CellCountRecord]) -> Result<LoadSummary> {
    let mut summary = LoadSummary {
        records: records.len(),
        ..Default::default()
    };

    let tx = store.transaction("load subjects")?;
    for record in records {
        summary.subjects_inserted += insert_subject(&tx, record)?;
    }
    tx.commit().map_err(FreqError::during("commit subjects"))?;

    let tx = store.transaction("load samples")?;
    for record in records {
        let owner = subject_id(&tx, &record.subject)?.ok_or_else(|| {
            FreqError::Constraint(format!(
                "sample '{}' references unknown subject '{}'",
                record.sample, record.subject
            ))
        })?;
        summary.samples_inserted += insert_sample(
            &tx,
            &record.sample,
            owner,
            &record.sample_type,
            record.time_from_treatment_start,
        )?;
    }
    tx.commit().map_err(FreqError::during("commit samples"))?;

    let tx = store.transaction("load cell counts")?;
    for record in records {
        for (cell_type, count) in record.counts() {
            summary.counts_inserted += insert_count(&tx, &record.sample, cell_type.name(), count)?;
        }
    }
    tx.commit().map_err(FreqError::during("commit cell counts"))?;

    tracing::info!(
        records = summary.records,
        subjects = summary.subjects_inserted,
        samples = summary.samples_inserted,
        counts = summary.counts_inserted,
        "Database created and data loaded"
    );

    Ok(summary)
}

/// Insert a subject unless its label already exists. Returns the number of new rows.
pub fn insert_subject(conn: &Connection, record: &CellCountRecord) -> Result<usize> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO cell_subjects (project, subject, condition, age, sex, treatment, response)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            record.project,
            record.subject,
            record.condition,
            record.age,
            record.sex,
            record.treatment,
            record.response,
        ])
    })
    .map_err(FreqError::during("insert subject"))
}

/// Look up the generated id for a subject label.
pub fn subject_id(conn: &Connection, subject: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT subject_id FROM cell_subjects WHERE subject = ?1",
        [subject],
        |row| row.get(0),
    )
    .optional()
    .map_err(FreqError::during("look up subject"))
}

/// Insert a sample unless its label already exists.
///
/// Fails with [`FreqError::Constraint`] when `subject_id` does not name an
/// existing subject.
pub fn insert_sample(
    conn: &Connection,
    sample: &str,
    subject_id: i64,
    sample_type: &str,
    time_from_treatment_start: Option<i64>,
) -> Result<usize> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO cell_samples (sample, subject_id, sample_type, time_from_treatment_start)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            sample,
            subject_id,
            sample_type,
            time_from_treatment_start
        ])
    })
    .map_err(FreqError::during("insert sample"))
}

/// Insert one (sample, cell_type, count) row unless the pair already exists.
pub fn insert_count(conn: &Connection, sample: &str, cell_type: &str, count: u64) -> Result<usize> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO cell_counts (sample, cell_type, count) VALUES (?1, ?2, ?3)",
    )
    .and_then(|mut stmt| stmt.execute(params![sample, cell_type, count]))
    .map_err(FreqError::during("insert cell count"))
}
