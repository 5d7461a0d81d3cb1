//! Report configuration and execution.

pub mod report;
mod runner;

pub use report::Report;
pub use runner::{Pipeline, ReportConfig};
