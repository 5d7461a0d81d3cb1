//! Summary statistics of a set of percentages.

use serde::{Deserialize, Serialize};

/// Five-number summary plus Tukey whiskers and outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionProfile {
    /// Number of observations.
    pub n: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    /// Lowest observation within 1.5 IQR below Q1.
    pub lower_whisker: f64,
    /// Highest observation within 1.5 IQR above Q3.
    pub upper_whisker: f64,
    /// Observations outside the whiskers.
    pub outliers: Vec<f64>,
}

impl DistributionProfile {
    /// Interquartile range.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Median of a set of values. Returns `None` for an empty set.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let n = sorted.len();
    if n % 2 == 0 {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    } else {
        Some(sorted[n / 2])
    }
}

/// Quantile with linear interpolation between order statistics.
///
/// `values` must be sorted ascending and non-empty; `q` is clamped to [0, 1].
pub fn quantile_sorted(values: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}

/// Profile a set of values. Returns `None` for an empty set.
pub fn profile_distribution(values: &[f64]) -> Option<DistributionProfile> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let n = sorted.len();

    let q1 = quantile_sorted(&sorted, 0.25);
    let median = quantile_sorted(&sorted, 0.5);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    let inside: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|&v| v >= lower_fence && v <= upper_fence)
        .collect();
    let outliers: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .collect();

    Some(DistributionProfile {
        n,
        min: sorted[0],
        q1,
        median,
        q3,
        max: sorted[n - 1],
        lower_whisker: inside.first().copied().unwrap_or(q1),
        upper_whisker: inside.last().copied().unwrap_or(q3),
        outliers,
    })
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[7.5]), Some(7.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_quantiles() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile_sorted(&values, 0.25), 2.0);
        assert_relative_eq!(quantile_sorted(&values, 0.5), 3.0);
        assert_relative_eq!(quantile_sorted(&values, 0.75), 4.0);

        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile_sorted(&values, 0.25), 1.75);
        assert_relative_eq!(quantile_sorted(&values, 0.75), 3.25);
    }

    #[test]
    fn test_profile_outliers() {
        let profile = profile_distribution(&[10.0, 11.0, 12.0, 13.0, 14.0, 50.0]).unwrap();

        assert_eq!(profile.n, 6);
        assert_relative_eq!(profile.median, 12.5);
        assert_eq!(profile.outliers, vec![50.0]);
        assert_relative_eq!(profile.upper_whisker, 14.0);
        assert_relative_eq!(profile.lower_whisker, 10.0);
        assert_relative_eq!(profile.max, 50.0);
    }

    #[test]
    fn test_profile_single_value() {
        let profile = profile_distribution(&[42.0]).unwrap();
        assert_eq!(profile.iqr(), 0.0);
        assert_eq!(profile.lower_whisker, 42.0);
        assert_eq!(profile.upper_whisker, 42.0);
        assert!(profile.outliers.is_empty());
    }
}
