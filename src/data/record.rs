//! Input records: one row per sample with wide per-cell-type count columns.

use crate::error::{FreqError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Immune cell populations measured in every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    BCell,
    Cd8TCell,
    Cd4TCell,
    NkCell,
    Monocyte,
}

impl CellType {
    /// All cell types in input column order.
    pub const ALL: [CellType; 5] = [
        CellType::BCell,
        CellType::Cd8TCell,
        CellType::Cd4TCell,
        CellType::NkCell,
        CellType::Monocyte,
    ];

    /// Column name in the input file, also used as the stored cell type label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BCell => "b_cell",
            Self::Cd8TCell => "cd8_t_cell",
            Self::Cd4TCell => "cd4_t_cell",
            Self::NkCell => "nk_cell",
            Self::Monocyte => "monocyte",
        }
    }

    /// Look up a cell type by its column name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the cell count file.
///
/// Count columns are optional: an empty cell means the population was not
/// measured, which is different from a count of zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellCountRecord {
    pub project: String,
    pub subject: String,
    pub condition: String,
    pub age: Option<i64>,
    pub sex: String,
    pub treatment: String,
    pub response: String,
    pub sample: String,
    pub sample_type: String,
    pub time_from_treatment_start: Option<i64>,
    pub b_cell: Option<u64>,
    pub cd8_t_cell: Option<u64>,
    pub cd4_t_cell: Option<u64>,
    pub nk_cell: Option<u64>,
    pub monocyte: Option<u64>,
}

impl CellCountRecord {
    /// Count for one cell type, `None` when the cell was empty.
    pub fn count(&self, cell_type: CellType) -> Option<u64> {
        match cell_type {
            CellType::BCell => self.b_cell,
            CellType::Cd8TCell => self.cd8_t_cell,
            CellType::Cd4TCell => self.cd4_t_cell,
            CellType::NkCell => self.nk_cell,
            CellType::Monocyte => self.monocyte,
        }
    }

    /// Long-form (cell type, count) pairs, skipping unmeasured populations.
    pub fn counts(&self) -> impl Iterator<Item = (CellType, u64)> + '_ {
        CellType::ALL
            .iter()
            .filter_map(move |&c| self.count(c).map(|n| (c, n)))
    }

    fn validate(&self, row: usize) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(FreqError::InvalidRecord {
                row,
                reason: "subject label is empty".to_string(),
            });
        }
        if self.sample.trim().is_empty() {
            return Err(FreqError::InvalidRecord {
                row,
                reason: "sample label is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Read all records from a comma-delimited cell count file.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<CellCountRecord>> {
    let file = File::open(path)?;
    read_records_from(file)
}

/// Read all records from any reader with the fixed cell count header.
///
/// Rows are numbered from 1 (the first data row) in error messages.
pub fn read_records_from<R: Read>(reader: R) -> Result<Vec<CellCountRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (idx, result) in csv_reader.deserialize::<CellCountRecord>().enumerate() {
        let record = result?;
        record.validate(idx + 1)?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(FreqError::EmptyData("No rows in cell count file".to_string()));
    }

    Ok(records)
}
