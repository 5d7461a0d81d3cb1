//! Immune Cell Population Frequency Library
//!
//! This library loads per-sample immune cell counts into SQLite, derives the
//! relative frequency of each population, and compares responders with
//! non-responders for a chosen cohort.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Input records (CellCountRecord, CellType) and result tables
//! - **store**: SQLite schema, loading, the frequency table, cohort views
//! - **profile**: Distribution summaries (median, quartiles, whiskers)
//! - **test**: Hypothesis testing (Mann-Whitney U)
//! - **correct**: Multiple testing correction (Bonferroni)
//! - **compare**: Responder vs non-responder comparison per population
//! - **plot**: SVG grouped box plot
//! - **pipeline**: Report configuration and execution
//!
//! # Example
//!
//! ```no_run
//! use cellfreq::prelude::*;
//!
//! let report = Pipeline::new()
//!     .database("cell_counts.db")
//!     .input("cell-count.csv")
//!     .cohort(CohortFilter::new("melanoma", "miraclib", "PBMC"))
//!     .run()
//!     .unwrap();
//!
//! println!("{}", report.comparison.conclusion());
//! report.write_dir("report").unwrap();
//! ```

pub mod compare;
pub mod correct;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod profile;
pub mod store;
pub mod test;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::compare::{compare_cohort, compare_responses, ComparatorConfig};
    pub use crate::correct::{correct_bonferroni, BonferroniCorrected};
    pub use crate::data::{
        read_records, CellCountRecord, CellType, CohortMember, CohortSummary, ComparisonResult,
        ComparisonSet, FrequencyRow, GroupCount, PlotPoint, ResponseAverage,
    };
    pub use crate::error::{FreqError, Result};
    pub use crate::pipeline::{Pipeline, Report, ReportConfig};
    pub use crate::plot::{render_box_plot, write_box_plot};
    pub use crate::profile::{median, profile_distribution, DistributionProfile};
    pub use crate::store::{
        build_frequency_summary, clear, create_schema, load_file, load_records,
        read_frequency_summary, rebuild_frequency_summary, CohortFilter, FrequencyBuild,
        LoadSummary, Store, ZeroTotalPolicy,
    };
    pub use crate::test::{test_mann_whitney, MannWhitneyResult, PValueMethod};
}
