//! Data structures for cell count ingestion and reporting.

mod record;
mod result;

pub use record::{read_records, read_records_from, CellCountRecord, CellType};
pub use result::{
    averages_to_tsv, frequencies_to_tsv, group_counts_to_tsv, members_to_tsv,
    plot_points_to_tsv, CohortMember, CohortSummary, ComparisonResult, ComparisonSet,
    FrequencyRow, GroupCount, PlotPoint, ResponseAverage,
};
