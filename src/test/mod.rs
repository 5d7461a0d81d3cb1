//! Statistical hypothesis testing for group comparisons.


pub use mann_whitney::{test_mann_whitney, MannWhitneyResult, PValueMethod, EXACT_MAX_N};
