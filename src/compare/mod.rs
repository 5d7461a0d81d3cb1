//! Responder vs non-responder comparison of population frequencies.
//!
//! For each population (in first-seen order) the cohort percentages are split
//! by response label, each group's median is computed, the groups are
//! compared with a two-sided Mann-Whitney U test, and the raw p-values are
//! Bonferroni-adjusted across all populations tested.

use crate::correct::correct_bonferroni;
use crate::data::{ComparisonResult, ComparisonSet, PlotPoint};
use crate::error::{FreqError, Result};
use crate::profile::median;
use crate::store::{CohortFilter, Store};
use crate::test::{test_mann_whitney, MannWhitneyResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for the response comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Response label of the responder group.
    pub responder: String,
    /// Response label of the non-responder group.
    pub non_responder: String,
    /// Significance threshold for adjusted p-values.
    pub alpha: f64,
    /// Cap Bonferroni-adjusted p-values at 1.0.
    pub clip_adjusted: bool,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            responder: "yes".to_string(),
            non_responder: "no".to_string(),
            alpha: 0.05,
            clip_adjusted: true,
        }
    }
}

impl ComparatorConfig {
    /// Check the threshold and labels.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(FreqError::InvalidParameter(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.responder == self.non_responder {
            return Err(FreqError::InvalidParameter(
                "responder and non-responder labels must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Populations in the order they first appear.
pub fn populations(points: &[PlotPoint]) -> Vec<String> {
    let mut seen = HashSet::new();
    points
        .iter()
        .filter(|p| seen.insert(p.population.as_str()))
        .map(|p| p.population.clone())
        .collect()
}

/// Percentages of one population for one response label.
fn group_values(points: &[PlotPoint], population: &str, response: &str) -> Vec<f64> {
    points
        .iter()
        .filter(|p| p.population == population && p.response == response)
        .map(|p| p.percentage)
        .collect()
}

struct PopulationTest {
    population: String,
    median_yes: f64,
    median_no: f64,
    test: MannWhitneyResult,
}

fn test_population(
    points: &[PlotPoint],
    population: &str,
    config: &ComparatorConfig,
) -> Result<PopulationTest> {
    let yes = group_values(points, population, &config.responder);
    let no = group_values(points, population, &config.non_responder);

    let (median_yes, median_no) = match (median(&yes), median(&no)) {
        (Some(y), Some(n)) => (y, n),
        (None, _) => {
            return Err(FreqError::EmptyGroup {
                cell_type: population.to_string(),
                response: config.responder.clone(),
            })
        }
        (_, None) => {
            return Err(FreqError::EmptyGroup {
                cell_type: population.to_string(),
                response: config.non_responder.clone(),
            })
        }
    };

    let test = test_mann_whitney(&yes, &no)?;
    tracing::debug!(
        population,
        n_yes = yes.len(),
        n_no = no.len(),
        u = test.u_statistic,
        p = test.p_value,
        method = ?test.method,
        "tested population"
    );

    Ok(PopulationTest {
        population: population.to_string(),
        median_yes,
        median_no,
        test,
    })
}

/// Compare responders and non-responders for every population in `points`.
///
/// Fails with [`FreqError::EmptyGroup`] if any population lacks observations
/// in either group.
pub fn compare_responses(points: &[PlotPoint], config: &ComparatorConfig) -> Result<ComparisonSet> {
    config.validate()?;

    let pops = populations(points);
    let tests: Vec<PopulationTest> = pops
        .iter()
        .map(|pop| test_population(points, pop, config))
        .collect::<Result<Vec<_>>>()?;

    let p_values: Vec<f64> = tests.iter().map(|t| t.test.p_value).collect();
    let corrected = correct_bonferroni(&p_values, &pops, config.clip_adjusted);
    let significant = corrected.significant(config.alpha);

    let results = tests
        .into_iter()
        .zip(corrected.adjusted.iter().zip(significant))
        .map(|(t, (&adjusted_p, significant))| ComparisonResult {
            population: t.population,
            median_yes: t.median_yes,
            median_no: t.median_no,
            n_yes: t.test.n_x,
            n_no: t.test.n_y,
            u_statistic: t.test.u_statistic,
            p_value: t.test.p_value,
            adjusted_p,
            significant,
        })
        .collect();

    let method = format!(
        "Mann-Whitney U (two-sided), Bonferroni{}",
        if config.clip_adjusted { "" } else { " (unclipped)" }
    );
    Ok(ComparisonSet::new(method, config.alpha, results))
}

/// Compare responders and non-responders over a cohort's frequencies.
pub fn compare_cohort(
    store: &Store,
    filter: &CohortFilter,
    config: &ComparatorConfig,
) -> Result<ComparisonSet> {
    let points = filter.plot_points(store)?;
    compare_responses(&points, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(sample: usize, population: &str, response: &str, percentage: f64) -> PlotPoint {
        PlotPoint {
            sample: format!("s{}", sample),
            population: population.to_string(),
            response: response.to_string(),
            percentage,
        }
    }

    fn separated_points() -> Vec<PlotPoint> {
        let mut points = Vec::new();
        for i in 0..4 {
            // nk_cell first so first-seen order differs from alphabetical
            points.push(point(i, "nk_cell", "yes", 10.0 + i as f64));
            points.push(point(i, "b_cell", "yes", 30.0 + i as f64));
        }
        for i in 4..8 {
            points.push(point(i, "nk_cell", "no", 20.0 + i as f64));
            points.push(point(i, "b_cell", "no", 30.5 + i as f64));
        }
        points
    }

    #[test]
    fn test_first_seen_order() {
        let set = compare_responses(&separated_points(), &ComparatorConfig::default()).unwrap();
        let order: Vec<&str> = set.results.iter().map(|r| r.population.as_str()).collect();
        assert_eq!(order, vec!["nk_cell", "b_cell"]);
    }

    #[test]
    fn test_medians() {
        let set = compare_responses(&separated_points(), &ComparatorConfig::default()).unwrap();
        let nk = set.get("nk_cell").unwrap();

        // yes: 10, 11, 12, 13; no: 24, 25, 26, 27
        assert_relative_eq!(nk.median_yes, 11.5);
        assert_relative_eq!(nk.median_no, 25.5);
        assert_eq!(nk.n_yes, 4);
        assert_eq!(nk.n_no, 4);
    }

    #[test]
    fn test_bonferroni_applied() {
        let config = ComparatorConfig {
            clip_adjusted: false,
            ..Default::default()
        };
        let set = compare_responses(&separated_points(), &config).unwrap();

        for r in &set.results {
            assert_relative_eq!(r.adjusted_p, r.p_value * 2.0, epsilon = 1e-12);
        }
        // Complete separation with 4 vs 4: p = 2 / C(8, 4)
        let nk = set.get("nk_cell").unwrap();
        assert_relative_eq!(nk.p_value, 2.0 / 70.0, epsilon = 1e-12);
        assert!(!nk.significant);
    }

    #[test]
    fn test_significance_flag() {
        let mut points = Vec::new();
        for i in 0..10 {
            points.push(point(i, "cd4_t_cell", "yes", 40.0 + i as f64));
            points.push(point(100 + i, "cd4_t_cell", "no", 10.0 + i as f64));
        }
        let set = compare_responses(&points, &ComparatorConfig::default()).unwrap();
        let cd4 = &set.results[0];

        assert!(cd4.adjusted_p < 0.05);
        assert!(cd4.significant);
        assert_eq!(set.significant().len(), 1);
    }

    #[test]
    fn test_empty_group_is_domain_error() {
        let points = vec![
            point(0, "b_cell", "yes", 10.0),
            point(1, "b_cell", "yes", 12.0),
        ];
        let err = compare_responses(&points, &ComparatorConfig::default()).unwrap_err();
        match err {
            FreqError::EmptyGroup { cell_type, response } => {
                assert_eq!(cell_type, "b_cell");
                assert_eq!(response, "no");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_alpha() {
        let config = ComparatorConfig {
            alpha: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            compare_responses(&separated_points(), &config),
            Err(FreqError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_no_points() {
        let set = compare_responses(&[], &ComparatorConfig::default()).unwrap();
        assert!(set.is_empty());
    }
}
