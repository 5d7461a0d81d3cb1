//! Report configuration and the runner that executes it against a store.

use super::report::Report;
use crate::compare::{compare_responses, ComparatorConfig};
use crate::error::{FreqError, Result};
use crate::plot::DEFAULT_TITLE;
use crate::store::{
    build_frequency_summary, create_schema, load_file, read_frequency_summary,
    rebuild_frequency_summary, CohortFilter, Store, ZeroTotalPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Report configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Name of the report.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// SQLite database file.
    pub database: PathBuf,
    /// Cell count CSV to load before reporting. Nothing is loaded when absent.
    pub input: Option<PathBuf>,
    /// Cohort used for averages, comparison and plot. The cohort tables use
    /// the same criteria restricted to baseline samples.
    pub cohort: CohortFilter,
    /// Responder comparison settings.
    pub comparison: ComparatorConfig,
    /// Handling of samples whose counts sum to zero.
    pub zero_total: ZeroTotalPolicy,
    /// Drop and recreate the frequency table instead of reusing it.
    pub rebuild_frequencies: bool,
    /// Box plot title.
    pub plot_title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            name: "immune-cell-report".to_string(),
            description: Some(
                "Melanoma PBMC samples on miraclib: responders vs non-responders".to_string(),
            ),
            database: PathBuf::from("cell_counts.db"),
            input: Some(PathBuf::from("cell-count.csv")),
            cohort: CohortFilter::default(),
            comparison: ComparatorConfig::default(),
            zero_total: ZeroTotalPolicy::default(),
            rebuild_frequencies: true,
            plot_title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ReportConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(FreqError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(FreqError::from)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

/// Builder for configuring and running a report.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: ReportConfig,
}

impl Pipeline {
    /// Create a pipeline with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a config.
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Set the report name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    /// Set the database file.
    pub fn database<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.database = path.as_ref().to_path_buf();
        self
    }

    /// Load this CSV before reporting.
    pub fn input<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.input = Some(path.as_ref().to_path_buf());
        self
    }

    /// Report on the existing database contents without loading.
    pub fn no_input(mut self) -> Self {
        self.config.input = None;
        self
    }

    /// Set the cohort criteria.
    pub fn cohort(mut self, cohort: CohortFilter) -> Self {
        self.config.cohort = cohort;
        self
    }

    /// Set the significance threshold.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.comparison.alpha = alpha;
        self
    }

    /// Cap adjusted p-values at 1.0 (the default) or keep the raw product.
    pub fn clip_adjusted(mut self, clip: bool) -> Self {
        self.config.comparison.clip_adjusted = clip;
        self
    }

    /// Set the zero-total policy.
    pub fn zero_total(mut self, policy: ZeroTotalPolicy) -> Self {
        self.config.zero_total = policy;
        self
    }

    /// Rebuild the frequency table on every run.
    pub fn rebuild_frequencies(mut self, rebuild: bool) -> Self {
        self.config.rebuild_frequencies = rebuild;
        self
    }

    /// Convert to config for serialization.
    pub fn to_config(&self) -> ReportConfig {
        self.config.clone()
    }

    /// Open the configured database, run the report, and close it.
    pub fn run(&self) -> Result<Report> {
        let mut store = Store::open(&self.config.database)?;
        let report = self.run_on(&mut store)?;
        store.close()?;
        Ok(report)
    }

    /// Run the report against an open store.
    pub fn run_on(&self, store: &mut Store) -> Result<Report> {
        let config = &self.config;
        config.comparison.validate()?;

        create_schema(store)?;

        let load = match &config.input {
            Some(input) => Some(load_file(store, input)?),
            None => None,
        };

        let frequency_build = if config.rebuild_frequencies {
            rebuild_frequency_summary(store, config.zero_total)?
        } else {
            build_frequency_summary(store, config.zero_total)?
        };
        let frequencies = read_frequency_summary(store)?;

        let averages = config.cohort.response_averages(store)?;
        let plot_points = config.cohort.plot_points(store)?;
        let comparison = compare_responses(&plot_points, &config.comparison)?;
        let baseline = config.cohort.clone().baseline().summary(store)?;

        tracing::info!(
            name = %config.name,
            frequencies = frequencies.len(),
            points = plot_points.len(),
            significant = comparison.significant().len(),
            "report complete"
        );

        Ok(Report {
            name: config.name.clone(),
            cohort: config.cohort.clone(),
            plot_title: config.plot_title.clone(),
            load,
            frequency_build,
            frequencies,
            averages,
            comparison,
            baseline,
            plot_points,
        })
    }
}
