//! Derived per-sample frequency table.
//!
//! For every sample the total count across its measured populations is
//! computed, and each (sample, population) row gets
//! `percentage = round(100 * count / total, 2)`. The result is materialized
//! as `frequency_summary`.
//!
//! A sample whose total is zero has no defined percentages. Depending on the
//! [`ZeroTotalPolicy`] its rows are kept with a NULL percentage (and the
//! sample is reported), or the build fails without touching any existing
//! derived table.

use super::{table_exists, Store, Table};
use crate::data::FrequencyRow;
use crate::error::{FreqError, Result};
use rusqlite::{params, Transaction};
use serde::{Deserialize, Serialize};

/// How to handle samples whose counts sum to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroTotalPolicy {
    /// Keep the rows with a NULL percentage and log a warning.
    #[default]
    Null,
    /// Fail the build with [`FreqError::ZeroTotal`].
    Error,
}

/// Outcome of a frequency table build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBuild {
    /// Whether the table was (re)created. `false` when it already existed.
    pub created: bool,
    /// Number of rows written.
    pub rows: usize,
    /// Samples whose total count is zero.
    pub zero_total_samples: Vec<String>,
}

/// Percentage of `total` represented by `count`, rounded to 2 decimals.
///
/// Returns `None` when `total` is zero.
pub fn percentage(count: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let pct = count as f64 / total as f64 * 100.0;
    Some((pct * 100.0).round() / 100.0)
}

/// Build the frequency table unless it already exists.
pub fn build_frequency_summary(store: &mut Store, policy: ZeroTotalPolicy) -> Result<FrequencyBuild> {
    if store.table_exists(Table::FrequencySummary)? {
        tracing::debug!("frequency_summary exists, skipping build");
        return Ok(FrequencyBuild::default());
    }

    let tx = store.transaction("build frequency summary")?;
    let build = materialize(&tx, policy)?;
    tx.commit()
        .map_err(FreqError::during("commit frequency summary"))?;

    Ok(build)
}

/// Drop and rebuild the frequency table in a single transaction.
///
/// If the build fails the previous table is left as it was.
pub fn rebuild_frequency_summary(
    store: &mut Store,
    policy: ZeroTotalPolicy,
) -> Result<FrequencyBuild> {
    let tx = store.transaction("rebuild frequency summary")?;
    tx.execute_batch("DROP TABLE IF EXISTS frequency_summary;")
        .map_err(FreqError::during("drop frequency summary"))?;
    let build = materialize(&tx, policy)?;
    tx.commit()
        .map_err(FreqError::during("commit frequency summary"))?;

    Ok(build)
}

/// Drop the frequency table if present.
pub fn drop_frequency_summary(store: &Store) -> Result<()> {
    store
        .connection()
        .execute_batch("DROP TABLE IF EXISTS frequency_summary;")
        .map_err(FreqError::during("drop frequency summary"))
}

/// Read the full frequency table, ordered by sample.
pub fn read_frequency_summary(store: &Store) -> Result<Vec<FrequencyRow>> {
    if !store.table_exists(Table::FrequencySummary)? {
        return Err(FreqError::MissingTable(
            Table::FrequencySummary.name().to_string(),
        ));
    }

    let conn = store.connection();
    let mut stmt = conn
        .prepare(
            "SELECT sample, total_count, population, count, percentage
             FROM frequency_summary ORDER BY sample, rowid",
        )
        .map_err(FreqError::during("read frequency summary"))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(FrequencyRow {
                sample: row.get(0)?,
                total_count: row.get(1)?,
                population: row.get(2)?,
                count: row.get(3)?,
                percentage: row.get(4)?,
            })
        })
        .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(FreqError::during("read frequency summary"))?;

    Ok(rows)
}

fn materialize(tx: &Transaction<'_>, policy: ZeroTotalPolicy) -> Result<FrequencyBuild> {
    if !table_exists(tx, Table::CellCounts)? {
        return Err(FreqError::MissingTable(Table::CellCounts.name().to_string()));
    }

    tx.execute_batch(
        "CREATE TABLE frequency_summary(
            sample TEXT NOT NULL,
            total_count INTEGER NOT NULL,
            population TEXT NOT NULL,
            count INTEGER NOT NULL,
            percentage REAL
        );",
    )
    .map_err(FreqError::during("create frequency summary"))?;

    let mut aggregate = tx
        .prepare(
            "WITH total_cell_counts AS (
                SELECT sample, SUM(count) AS total_count FROM cell_counts GROUP BY sample
             )
             SELECT c.sample, t.total_count, c.cell_type, c.count
             FROM cell_counts c JOIN total_cell_counts t ON c.sample = t.sample
             ORDER BY c.sample, c.count_id",
        )
        .map_err(FreqError::during("aggregate cell counts"))?;
    let counts: Vec<(String, u64, String, u64)> = aggregate
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(FreqError::during("aggregate cell counts"))?;

    let mut build = FrequencyBuild {
        created: true,
        ..Default::default()
    };

    let mut insert = tx
        .prepare(
            "INSERT INTO frequency_summary (sample, total_count, population, count, percentage)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(FreqError::during("write frequency summary"))?;

    for (sample, total, population, count) in &counts {
        let pct = percentage(*count, *total);
        if pct.is_none() && build.zero_total_samples.last() != Some(sample) {
            match policy {
                ZeroTotalPolicy::Error => return Err(FreqError::ZeroTotal(sample.clone())),
                ZeroTotalPolicy::Null => {
                    tracing::warn!(sample = %sample, "sample has zero total count, percentages left NULL");
                    build.zero_total_samples.push(sample.clone());
                }
            }
        }
        insert
            .execute(params![sample, total, population, count, pct])
            .map_err(FreqError::during("write frequency summary"))?;
        build.rows += 1;
    }

    tracing::info!(
        rows = build.rows,
        zero_total = build.zero_total_samples.len(),
        "frequency summary built"
    );

    Ok(build)
}
