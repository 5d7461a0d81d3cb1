//! Result types produced by the store queries and the comparator.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row of the derived frequency summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRow {
    /// Sample label.
    pub sample: String,
    /// Total count across all measured populations in the sample.
    pub total_count: u64,
    /// Cell type label.
    pub population: String,
    /// Raw count for this population.
    pub count: u64,
    /// Percentage of the sample total, `None` when the total is zero.
    pub percentage: Option<f64>,
}

/// Average percentage of one population within one response group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAverage {
    pub population: String,
    pub response: String,
    /// Mean percentage rounded to 2 decimals.
    pub avg_percentage: f64,
}

/// A cohort sample joined with its subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMember {
    pub project: String,
    pub subject_id: i64,
    pub response: String,
    pub sex: String,
    pub sample: String,
}

/// A grouped count (per project, per response, per sex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub group: String,
    pub count: u64,
}

/// The four cohort views.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortSummary {
    /// Every (project, subject, response, sex, sample) tuple in the cohort.
    pub members: Vec<CohortMember>,
    /// Number of samples per project.
    pub samples_per_project: Vec<GroupCount>,
    /// Number of distinct subjects per response.
    pub subjects_per_response: Vec<GroupCount>,
    /// Number of distinct subjects per sex.
    pub subjects_per_sex: Vec<GroupCount>,
}

/// A single observation for the grouped box plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub sample: String,
    pub population: String,
    pub response: String,
    pub percentage: f64,
}

/// Comparison of one population between responders and non-responders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Cell type label.
    pub population: String,
    /// Median percentage among responders.
    pub median_yes: f64,
    /// Median percentage among non-responders.
    pub median_no: f64,
    /// Number of responder observations.
    pub n_yes: usize,
    /// Number of non-responder observations.
    pub n_no: usize,
    /// Mann-Whitney U statistic for the responder group.
    pub u_statistic: f64,
    /// Raw two-sided p-value.
    pub p_value: f64,
    /// Bonferroni-adjusted p-value.
    pub adjusted_p: f64,
    /// Whether `adjusted_p` is below the significance threshold.
    pub significant: bool,
}

impl ComparisonResult {
    /// Label used in reports.
    pub fn significance_label(&self) -> &'static str {
        if self.significant {
            "Yes"
        } else {
            "No"
        }
    }
}

/// Collection of per-population comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSet {
    /// Test and correction used to generate these results.
    pub method: String,
    /// Threshold applied to the adjusted p-values.
    pub alpha: f64,
    /// Results in first-seen population order.
    pub results: Vec<ComparisonResult>,
}

impl ComparisonSet {
    /// Create a new comparison set.
    pub fn new(method: String, alpha: f64, results: Vec<ComparisonResult>) -> Self {
        Self {
            method,
            alpha,
            results,
        }
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get a result by population label.
    pub fn get(&self, population: &str) -> Option<&ComparisonResult> {
        self.results.iter().find(|r| r.population == population)
    }

    /// Results significant after correction.
    pub fn significant(&self) -> Vec<&ComparisonResult> {
        self.results.iter().filter(|r| r.significant).collect()
    }

    /// One-sentence conclusion for the text report.
    pub fn conclusion(&self) -> String {
        let sig = self.significant();
        if sig.is_empty() {
            format!(
                "None of the {} population frequency differences were statistically significant (adjusted p < {}).",
                self.len(),
                self.alpha
            )
        } else {
            let names: Vec<&str> = sig.iter().map(|r| r.population.as_str()).collect();
            format!(
                "{} of {} populations differ significantly between responders and non-responders (adjusted p < {}): {}.",
                sig.len(),
                self.len(),
                self.alpha,
                names.join(", ")
            )
        }
    }

    /// Write results to TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_table(
            path,
            "population\tmedian_yes_response\tmedian_no_response\tn_yes\tn_no\tu_statistic\tp_value\tadjusted_p\tsignificant",
            &self.results,
            |r| {
                format!(
                    "{}\t{:.4}\t{:.4}\t{}\t{}\t{:.1}\t{:.6}\t{:.6}\t{}",
                    r.population,
                    r.median_yes,
                    r.median_no,
                    r.n_yes,
                    r.n_no,
                    r.u_statistic,
                    r.p_value,
                    r.adjusted_p,
                    r.significance_label()
                )
            },
        )
    }
}

impl std::fmt::Display for ComparisonSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Method: {}", self.method)?;
        writeln!(
            f,
            "{:<12} {:>10} {:>10} {:>10} {:>10}  {}",
            "population", "median_yes", "median_no", "p_value", "adjusted_p", "significant"
        )?;
        for r in &self.results {
            writeln!(
                f,
                "{:<12} {:>10.2} {:>10.2} {:>10.4} {:>10.4}  {}",
                r.population,
                r.median_yes,
                r.median_no,
                r.p_value,
                r.adjusted_p,
                r.significance_label()
            )?;
        }
        Ok(())
    }
}

/// Write the frequency summary to a TSV file. Missing percentages are written as `NA`.
pub fn frequencies_to_tsv<P: AsRef<Path>>(rows: &[FrequencyRow], path: P) -> Result<()> {
    write_table(
        path,
        "sample\ttotal_count\tpopulation\tcount\tpercentage",
        rows,
        |r| {
            let pct = r
                .percentage
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "NA".to_string());
            format!(
                "{}\t{}\t{}\t{}\t{}",
                r.sample, r.total_count, r.population, r.count, pct
            )
        },
    )
}

/// Write per-response averages to a TSV file.
pub fn averages_to_tsv<P: AsRef<Path>>(rows: &[ResponseAverage], path: P) -> Result<()> {
    write_table(path, "population\tresponse\tavg_percentage", rows, |r| {
        format!("{}\t{}\t{:.2}", r.population, r.response, r.avg_percentage)
    })
}

/// Write the full cohort listing to a TSV file.
pub fn members_to_tsv<P: AsRef<Path>>(rows: &[CohortMember], path: P) -> Result<()> {
    write_table(path, "project\tsubject_id\tresponse\tsex\tsample", rows, |r| {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            r.project, r.subject_id, r.response, r.sex, r.sample
        )
    })
}

/// Write grouped counts to a TSV file with the given column names.
pub fn group_counts_to_tsv<P: AsRef<Path>>(
    rows: &[GroupCount],
    group_column: &str,
    count_column: &str,
    path: P,
) -> Result<()> {
    let header = format!("{}\t{}", group_column, count_column);
    write_table(path, &header, rows, |r| format!("{}\t{}", r.group, r.count))
}

/// Write box plot observations to a TSV file.
pub fn plot_points_to_tsv<P: AsRef<Path>>(rows: &[PlotPoint], path: P) -> Result<()> {
    write_table(path, "sample\tpopulation\tresponse\tpercentage", rows, |r| {
        format!(
            "{}\t{}\t{}\t{:.2}",
            r.sample, r.population, r.response, r.percentage
        )
    })
}

fn write_table<P, T, F>(path: P, header: &str, rows: &[T], line: F) -> Result<()>
where
    P: AsRef<Path>,
    F: Fn(&T) -> String,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", header)?;
    for row in rows {
        writeln!(writer, "{}", line(row))?;
    }
    writer.flush()?;

    Ok(())
}
