//! Bonferroni family-wise error rate correction.

use serde::{Deserialize, Serialize};

/// Result of Bonferroni correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonferroniCorrected {
    /// Labels in original order.
    pub labels: Vec<String>,
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Adjusted p-values.
    pub adjusted: Vec<f64>,
    /// Number of tests.
    pub n_tests: usize,
    /// Whether adjusted values were clipped to 1.0.
    pub clipped: bool,
}

impl BonferroniCorrected {
    /// Significance flag for each test, in original order.
    pub fn significant(&self, alpha: f64) -> Vec<bool> {
        self.adjusted.iter().map(|&p| p < alpha).collect()
    }
}

/// Apply Bonferroni correction.
///
/// Each p-value is multiplied by the number of tests:
/// adjusted[i] = p[i] * n
///
/// # Arguments
/// * `p_values` - Raw p-values
/// * `labels` - Test identifiers (same order as p_values)
/// * `clip` - Cap adjusted values at 1.0
pub fn correct_bonferroni(p_values: &[f64], labels: &[String], clip: bool) -> BonferroniCorrected {
    let n = p_values.len();
    let n_f64 = n as f64;

    let adjusted = p_values
        .iter()
        .map(|&p| {
            let adj = p * n_f64;
            if clip {
                adj.min(1.0)
            } else {
                adj
            }
        })
        .collect();

    BonferroniCorrected {
        labels: labels.to_vec(),
        p_values: p_values.to_vec(),
        adjusted,
        n_tests: n,
        clipped: clip,
    }
}
