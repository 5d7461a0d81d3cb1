//! The cohort predicate and every view that is built on it.
//!
//! A [`CohortFilter`] renders to a single `cohort` CTE selecting
//! (project, subject_id, response, sex, sample) for subjects and samples that
//! match the criteria. All cohort tables and all cohort-restricted frequency
//! queries join against that CTE, so the criteria are written exactly once.

use super::{Store, Table};
use crate::data::{CohortMember, CohortSummary, GroupCount, PlotPoint, ResponseAverage};
use crate::error::{FreqError, Result};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

/// Criteria selecting the cohort of interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortFilter {
    /// Subject disease condition.
    pub condition: String,
    /// Subject treatment arm.
    pub treatment: String,
    /// Sample type (blood fraction).
    pub sample_type: String,
    /// Restrict to samples taken at treatment start (time offset 0).
    pub baseline_only: bool,
}

impl Default for CohortFilter {
    fn default() -> Self {
        Self {
            condition: "melanoma".to_string(),
            treatment: "miraclib".to_string(),
            sample_type: "PBMC".to_string(),
            baseline_only: false,
        }
    }
}

impl CohortFilter {
    /// Create a filter for the given condition, treatment and sample type.
    pub fn new(condition: &str, treatment: &str, sample_type: &str) -> Self {
        Self {
            condition: condition.to_string(),
            treatment: treatment.to_string(),
            sample_type: sample_type.to_string(),
            baseline_only: false,
        }
    }

    /// Restrict to baseline samples.
    pub fn baseline(mut self) -> Self {
        self.baseline_only = true;
        self
    }


    /// The `WITH cohort AS (...)` clause. Binds `?1` condition, `?2` treatment,
    /// `?3` sample type.
    pub fn cte(&self) -> String {
        let mut sql = String::from(
            "WITH cohort AS (
                SELECT sub.project, sub.subject_id, sub.response, sub.sex, sam.sample
                FROM cell_subjects sub JOIN cell_samples sam ON sub.subject_id = sam.subject_id
                WHERE sub.condition = ?1 AND sub.treatment = ?2 AND sam.sample_type = ?3",
        );
        if self.baseline_only {
            sql.push_str(" AND sam.time_from_treatment_start = 0");
        }
        sql.push_str(") ");
        sql
    }

    fn query<T, F>(&self, store: &Store, operation: &str, select: &str, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        require(store, Table::Subjects)?;
        require(store, Table::Samples)?;
        let sql = format!("{}{}", self.cte(), select);
        let conn = store.connection();
        let mut stmt = conn.prepare(&sql).map_err(FreqError::during(operation))?;
        let rows = stmt
            .query_map(
                params![self.condition, self.treatment, self.sample_type],
                map,
            )
            .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(FreqError::during(operation))?;
        Ok(rows)
    }

    fn group_counts(&self, store: &Store, operation: &str, select: &str) -> Result<Vec<GroupCount>> {
        self.query(store, operation, select, |row| {
            Ok(GroupCount {
                group: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                count: row.get(1)?,
            })
        })
    }

    /// Every cohort sample joined with its subject.
    pub fn members(&self, store: &Store) -> Result<Vec<CohortMember>> {
        self.query(
            store,
            "list cohort",
            "SELECT project, subject_id, response, sex, sample FROM cohort ORDER BY subject_id, sample",
            |row| {
                Ok(CohortMember {
                    project: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    subject_id: row.get(1)?,
                    response: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    sex: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    sample: row.get(4)?,
                })
            },
        )
    }

    /// Number of cohort samples per project.
    pub fn samples_per_project(&self, store: &Store) -> Result<Vec<GroupCount>> {
        self.group_counts(
            store,
            "count samples per project",
            "SELECT project, COUNT(sample) FROM cohort GROUP BY project ORDER BY project",
        )
    }

    /// Number of distinct cohort subjects per response.
    pub fn subjects_per_response(&self, store: &Store) -> Result<Vec<GroupCount>> {
        self.group_counts(
            store,
            "count subjects per response",
            "SELECT response, COUNT(DISTINCT subject_id) FROM cohort GROUP BY response ORDER BY response",
        )
    }

    /// Number of distinct cohort subjects per sex.
    pub fn subjects_per_sex(&self, store: &Store) -> Result<Vec<GroupCount>> {
        self.group_counts(
            store,
            "count subjects per sex",
            "SELECT sex, COUNT(DISTINCT subject_id) FROM cohort GROUP BY sex ORDER BY sex",
        )
    }

    /// All four cohort views.
    pub fn summary(&self, store: &Store) -> Result<CohortSummary> {
        Ok(CohortSummary {
            members: self.members(store)?,
            samples_per_project: self.samples_per_project(store)?,
            subjects_per_response: self.subjects_per_response(store)?,
            subjects_per_sex: self.subjects_per_sex(store)?,
        })
    }

    /// Average percentage per (population, response) over cohort samples.
    ///
    /// Requires the frequency table. Rows without a percentage are ignored.
    pub fn response_averages(&self, store: &Store) -> Result<Vec<ResponseAverage>> {
        require(store, Table::FrequencySummary)?;
        self.query(
            store,
            "average frequencies by response",
            "SELECT f.population, c.response, ROUND(AVG(f.percentage), 2)
             FROM frequency_summary f JOIN cohort c ON f.sample = c.sample
             WHERE f.percentage IS NOT NULL
             GROUP BY f.population, c.response
             ORDER BY f.population, c.response",
            |row| {
                Ok(ResponseAverage {
                    population: row.get(0)?,
                    response: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    avg_percentage: row.get(2)?,
                })
            },
        )
    }

    /// One observation per (cohort sample, population) with a defined percentage.
    ///
    /// Rows are ordered by sample, then by the order populations were stored.
    pub fn plot_points(&self, store: &Store) -> Result<Vec<PlotPoint>> {
        require(store, Table::FrequencySummary)?;
        self.query(
            store,
            "select cohort frequencies",
            "SELECT f.sample, f.population, c.response, f.percentage
             FROM frequency_summary f JOIN cohort c ON f.sample = c.sample
             WHERE f.percentage IS NOT NULL
             ORDER BY f.sample, f.rowid",
            |row| {
                Ok(PlotPoint {
                    sample: row.get(0)?,
                    population: row.get(1)?,
                    response: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    percentage: row.get(3)?,
                })
            },
        )
    }
}

fn require(store: &Store, table: Table) -> Result<()> {
    if store.table_exists(table)? {
        Ok(())
    } else {
        Err(FreqError::MissingTable(table.name().to_string()))
    }
}
