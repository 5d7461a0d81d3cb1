//! Distribution profiling for frequency data.

pub mod distribution;

pub use distribution::{median, profile_distribution, quantile_sorted, DistributionProfile};
