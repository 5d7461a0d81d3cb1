//! Table definitions for the base tables.
//!
//! `cell_counts` carries `UNIQUE(sample, cell_type)` so that reloading a file
//! is a no-op under insert-or-ignore.

use super::Store;
use crate::error::{FreqError, Result};

const CREATE_SUBJECTS: &str = "
    CREATE TABLE IF NOT EXISTS cell_subjects(
        subject_id INTEGER PRIMARY KEY AUTOINCREMENT,
        project TEXT,
        subject TEXT NOT NULL UNIQUE,
        condition TEXT,
        age INTEGER,
        sex TEXT,
        treatment TEXT,
        response TEXT
    );";

const CREATE_SAMPLES: &str = "
    CREATE TABLE IF NOT EXISTS cell_samples(
        sample TEXT PRIMARY KEY NOT NULL,
        subject_id INTEGER NOT NULL,
        sample_type TEXT,
        time_from_treatment_start INTEGER,
        FOREIGN KEY(subject_id) REFERENCES cell_subjects(subject_id)
    );";

const CREATE_COUNTS: &str = "
    CREATE TABLE IF NOT EXISTS cell_counts(
        count_id INTEGER PRIMARY KEY AUTOINCREMENT,
        sample TEXT NOT NULL,
        cell_type TEXT NOT NULL,
        count INTEGER NOT NULL,
        UNIQUE(sample, cell_type),
        FOREIGN KEY(sample) REFERENCES cell_samples(sample)
    );";

/// Create the subject, sample and count tables if they are absent.
pub fn create_schema(store: &Store) -> Result<()> {
    let sql = [CREATE_SUBJECTS, CREATE_SAMPLES, CREATE_COUNTS].concat();
    store
        .connection()
        .execute_batch(&sql)
        .map_err(FreqError::during("create schema"))
}

/// Drop every table, derived table first.
pub fn clear(store: &Store) -> Result<()> {
    store
        .connection()
        .execute_batch(
            "DROP TABLE IF EXISTS frequency_summary;
             DROP TABLE IF EXISTS cell_counts;
             DROP TABLE IF EXISTS cell_samples;
             DROP TABLE IF EXISTS cell_subjects;",
        )
        .map_err(FreqError::during("clear database"))
}
