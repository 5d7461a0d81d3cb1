//! Grouped box plot of population frequencies by response.
//!
//! Response labels run along the x axis; within each response group there is
//! one box per population, coloured consistently across groups. Boxes span
//! Q1..Q3 with a median line, whiskers reach the most extreme values inside
//! the Tukey fences, and points beyond the fences are drawn as outliers.

use crate::data::PlotPoint;
use crate::error::{FreqError, Result};
use crate::profile::{profile_distribution, DistributionProfile};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::HashSet;
use std::path::Path;

/// Default title for the response box plot.
pub const DEFAULT_TITLE: &str = "Immune Cell Population Frequency by Response";

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 650;
const MARGIN: u32 = 20;
const FONT: &str = "sans-serif";
const TITLE_FONT_SIZE: u32 = 26;
const LABEL_FONT_SIZE: u32 = 16;
/// Fraction of a response group's slot taken up by its boxes.
const GROUP_WIDTH: f64 = 0.8;
/// Gap between neighbouring boxes as a fraction of the box slot.
const BOX_GAP: f64 = 0.2;

/// Boxes laid out for drawing: response groups on x, populations as hue.
struct Layout {
    responses: Vec<String>,
    populations: Vec<String>,
    /// (response index, population index, profile)
    boxes: Vec<(usize, usize, DistributionProfile)>,
    y_max: f64,
}

fn first_seen<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

impl Layout {
    fn from_points(points: &[PlotPoint]) -> Self {
        let responses = first_seen(points.iter().map(|p| p.response.as_str()));
        let populations = first_seen(points.iter().map(|p| p.population.as_str()));

        let mut boxes = Vec::new();
        for (r, response) in responses.iter().enumerate() {
            for (c, population) in populations.iter().enumerate() {
                let values: Vec<f64> = points
                    .iter()
                    .filter(|p| &p.response == response && &p.population == population)
                    .map(|p| p.percentage)
                    .collect();
                if let Some(profile) = profile_distribution(&values) {
                    boxes.push((r, c, profile));
                }
            }
        }

        let y_max = points
            .iter()
            .map(|p| p.percentage)
            .fold(0.0_f64, f64::max);

        Self {
            responses,
            populations,
            boxes,
            y_max,
        }
    }

    /// Left and right x bounds of the box for (response, population).
    fn box_span(&self, response: usize, population: usize) -> (f64, f64) {
        let slot = GROUP_WIDTH / self.populations.len() as f64;
        let left = response as f64 + (1.0 - GROUP_WIDTH) / 2.0 + population as f64 * slot;
        let pad = slot * BOX_GAP / 2.0;
        (left + pad, left + slot - pad)
    }
}

fn plot_error<E: std::fmt::Display>(e: E) -> FreqError {
    FreqError::Plot(e.to_string())
}

/// Render the grouped box plot as an SVG document.
///
/// Fails with [`FreqError::EmptyData`] when there is nothing to plot.
pub fn render_box_plot(points: &[PlotPoint], title: &str) -> Result<String> {
    if points.is_empty() {
        return Err(FreqError::EmptyData(
            "no frequencies to plot for the selected cohort".to_string(),
        ));
    }
    if let Some(p) = points.iter().find(|p| !p.percentage.is_finite()) {
        return Err(FreqError::Numerical(format!(
            "non-finite percentage for sample '{}' ({})",
            p.sample, p.population
        )));
    }

    let layout = Layout::from_points(points);
    let y_high = (layout.y_max * 1.05).max(1.0);
    let x_high = layout.responses.len() as f64;

    let mut svg = String::new();
    {
        let canvas = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        canvas.fill(&WHITE).map_err(plot_error)?;
        let root = canvas.margin(MARGIN, MARGIN, MARGIN, MARGIN);

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, TITLE_FONT_SIZE).into_font())
            .x_label_area_size(3 * LABEL_FONT_SIZE)
            .y_label_area_size(4 * LABEL_FONT_SIZE)
            .build_cartesian_2d(0.0..x_high, 0.0..y_high)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(0)
            .label_style((FONT, LABEL_FONT_SIZE).into_font())
            .y_desc("Relative frequency (%)")
            .y_label_formatter(&|y| format!("{:.0}", y))
            .draw()
            .map_err(plot_error)?;

        for (c, population) in layout.populations.iter().enumerate() {
            let color = Palette99::pick(c).to_rgba();
            let boxes: Vec<_> = layout.boxes.iter().filter(|b| b.1 == c).collect();

            // Boxes carry the legend entry for this population
            chart
                .draw_series(boxes.iter().map(|(r, _, profile)| {
                    let (left, right) = layout.box_span(*r, c);
                    Rectangle::new(
                        [(left, profile.q1), (right, profile.q3)],
                        color.mix(0.6).filled(),
                    )
                }))
                .map_err(plot_error)?
                .label(population.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.mix(0.6).filled())
                });

            for (r, _, profile) in &boxes {
                let (left, right) = layout.box_span(*r, c);
                let mid = (left + right) / 2.0;
                let cap = (right - left) / 4.0;

                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [(left, profile.q1), (right, profile.q3)],
                        BLACK.stroke_width(1),
                    )))
                    .map_err(plot_error)?;

                let lines = [
                    vec![(left, profile.median), (right, profile.median)],
                    vec![(mid, profile.q3), (mid, profile.upper_whisker)],
                    vec![(mid, profile.q1), (mid, profile.lower_whisker)],
                    vec![(mid - cap, profile.upper_whisker), (mid + cap, profile.upper_whisker)],
                    vec![(mid - cap, profile.lower_whisker), (mid + cap, profile.lower_whisker)],
                ];
                chart
                    .draw_series(
                        lines
                            .into_iter()
                            .map(|line| PathElement::new(line, BLACK.stroke_width(1))),
                    )
                    .map_err(plot_error)?;

                chart
                    .draw_series(
                        profile
                            .outliers
                            .iter()
                            .map(|&y| Circle::new((mid, y), 3, BLACK.stroke_width(1))),
                    )
                    .map_err(plot_error)?;
            }
        }

        chart
            .configure_series_labels()
            .label_font((FONT, LABEL_FONT_SIZE).into_font())
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(plot_error)?;

        // Response labels centred under each group
        let label_style = TextStyle::from((FONT, LABEL_FONT_SIZE).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        for (r, response) in layout.responses.iter().enumerate() {
            let (x, y) = chart.backend_coord(&(r as f64 + 0.5, 0.0));
            canvas
                .draw(&Text::new(response.clone(), (x, y + 8), label_style.clone()))
                .map_err(plot_error)?;
        }

        canvas.present().map_err(plot_error)?;
    }

    Ok(svg)
}

/// Render the grouped box plot and write it to `path`.
pub fn write_box_plot<P: AsRef<Path>>(points: &[PlotPoint], title: &str, path: P) -> Result<()> {
    let svg = render_box_plot(points, title)?;
    std::fs::write(path.as_ref(), svg)?;
    tracing::info!(path = %path.as_ref().display(), "wrote box plot");
    Ok(())
}
