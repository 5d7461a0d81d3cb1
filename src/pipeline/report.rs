//! The data products of one report run.

use crate::data::{
    averages_to_tsv, frequencies_to_tsv, group_counts_to_tsv, members_to_tsv,
    plot_points_to_tsv, CohortSummary, ComparisonSet, FrequencyRow, GroupCount, PlotPoint,
    ResponseAverage,
};
use crate::error::Result;
use crate::plot::write_box_plot;
use crate::store::{CohortFilter, FrequencyBuild, LoadSummary};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Files written by Report::write_dir
pub const FREQUENCY_FILE: &str = "frequency_summary.tsv";
pub const AVERAGES_FILE: &str = "response_averages.tsv";
pub const COMPARISON_FILE: &str = "response_comparison.tsv";
pub const MEMBERS_FILE: &str = "baseline_cohort.tsv";
pub const PROJECT_FILE: &str = "baseline_samples_per_project.tsv";
pub const RESPONSE_FILE: &str = "baseline_subjects_per_response.tsv";
pub const SEX_FILE: &str = "baseline_subjects_per_sex.tsv";
pub const PLOT_DATA_FILE: &str = "plot_points.tsv";
pub const PLOT_FILE: &str = "box_plot.svg";

/// Everything produced by a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report name.
    pub name: String,
    /// Cohort criteria used for the comparison.
    pub cohort: CohortFilter,
    /// Box plot title.
    pub plot_title: String,
    /// Outcome of loading the input, if one was given.
    pub load: Option<LoadSummary>,
    /// Outcome of building the frequency table.
    pub frequency_build: FrequencyBuild,
    /// The full frequency table.
    pub frequencies: Vec<FrequencyRow>,
    /// Cohort averages by population and response.
    pub averages: Vec<ResponseAverage>,
    /// Responder vs non-responder comparison.
    pub comparison: ComparisonSet,
    /// Cohort tables restricted to baseline samples.
    pub baseline: CohortSummary,
    /// Cohort observations behind the comparison and plot.
    pub plot_points: Vec<PlotPoint>,
}

impl Report {
    /// Write every table as TSV, plus the box plot, into `dir`.
    ///
    /// The directory is created if needed. The plot is skipped when the
    /// cohort has no observations. Returns the paths written.
    pub fn write_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        let mut path = |name: &str| {
            let p = dir.join(name);
            written.push(p.clone());
            p
        };

        frequencies_to_tsv(&self.frequencies, path(FREQUENCY_FILE))?;
        averages_to_tsv(&self.averages, path(AVERAGES_FILE))?;
        self.comparison.to_tsv(path(COMPARISON_FILE))?;
        members_to_tsv(&self.baseline.members, path(MEMBERS_FILE))?;
        group_counts_to_tsv(
            &self.baseline.samples_per_project,
            "project",
            "n_samples",
            path(PROJECT_FILE),
        )?;
        group_counts_to_tsv(
            &self.baseline.subjects_per_response,
            "response",
            "n_subjects",
            path(RESPONSE_FILE),
        )?;
        group_counts_to_tsv(
            &self.baseline.subjects_per_sex,
            "sex",
            "n_subjects",
            path(SEX_FILE),
        )?;
        plot_points_to_tsv(&self.plot_points, path(PLOT_DATA_FILE))?;

        if self.plot_points.is_empty() {
            tracing::warn!("cohort has no observations, skipping box plot");
        } else {
            write_box_plot(&self.plot_points, &self.plot_title, path(PLOT_FILE))?;
        }

        tracing::info!(dir = %dir.display(), files = written.len(), "wrote report");
        Ok(written)
    }
}

fn write_groups(
    f: &mut std::fmt::Formatter<'_>,
    label: &str,
    groups: &[GroupCount],
) -> std::fmt::Result {
    let parts: Vec<String> = groups
        .iter()
        .map(|g| format!("{}={}", g.group, g.count))
        .collect();
    writeln!(f, "  {:<22} {}", label, parts.join(", "))
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Report: {}", self.name)?;
        writeln!(
            f,
            "Cohort: condition={} treatment={} sample_type={}",
            self.cohort.condition, self.cohort.treatment, self.cohort.sample_type
        )?;
        writeln!(f)?;

        if let Some(load) = &self.load {
            write!(f, "{}", load)?;
            writeln!(f)?;
        }

        writeln!(f, "Frequency table: {} rows", self.frequencies.len())?;
        if !self.frequency_build.zero_total_samples.is_empty() {
            writeln!(
                f,
                "  Samples with zero total (percentage NA): {}",
                self.frequency_build.zero_total_samples.join(", ")
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Average percentage by response")?;
        writeln!(f, "  {:<12} {:<10} {:>8}", "population", "response", "avg_%")?;
        for a in &self.averages {
            writeln!(
                f,
                "  {:<12} {:<10} {:>8.2}",
                a.population, a.response, a.avg_percentage
            )?;
        }
        writeln!(f)?;

        write!(f, "{}", self.comparison)?;
        writeln!(f, "{}", self.comparison.conclusion())?;
        writeln!(f)?;

        writeln!(f, "Baseline cohort: {} samples", self.baseline.members.len())?;
        write_groups(f, "Samples per project:", &self.baseline.samples_per_project)?;
        write_groups(f, "Subjects per response:", &self.baseline.subjects_per_response)?;
        write_groups(f, "Subjects per sex:", &self.baseline.subjects_per_sex)?;
        Ok(())
    }
}
