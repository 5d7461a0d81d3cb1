//! SVG rendering of cohort frequencies.

pub mod boxplot;

pub use boxplot::{render_box_plot, write_box_plot, DEFAULT_TITLE};
