use thiserror::Error;

use crate::models::MetricStats;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("cannot compute a statistic over an empty sequence")]
    EmptyInput,
}

/// Median of `values`. Even counts average the two middle elements.
pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        Ok(sorted[mid])
    } else {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Arithmetic mean of `values`.
pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n-1) standard deviation. Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}

impl MetricStats {
    /// Mean/median/std over `values`; all fields `None` when empty.
    pub fn from_values(values: &[f64]) -> Self {
        match (mean(values), median(values)) {
            (Ok(mean), Ok(median)) => Self {
                mean: Some(mean),
                median: Some(median),
                std: Some(sample_std_dev(values)),
            },
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert_eq!(median(&[-14.0]).unwrap(), -14.0);
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), Err(StatsError::EmptyInput));
        assert_eq!(mean(&[]), Err(StatsError::EmptyInput));
    }

    #[test]
    fn test_sample_std_dev() {
        assert_eq!(sample_std_dev(&[]), 0.0);
        assert_eq!(sample_std_dev(&[-23.0]), 0.0);
        // mean 5, squared deviations sum 32, n-1 = 7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std_dev(&v) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_metric_stats_empty_is_all_none() {
        let stats = MetricStats::from_values(&[]);
        assert!(stats.mean.is_none());
        assert!(stats.median.is_none());
        assert!(stats.std.is_none());
    }

    #[test]
    fn test_metric_stats_single_value() {
        let stats = MetricStats::from_values(&[-1.5]);
        assert_eq!(stats.mean, Some(-1.5));
        assert_eq!(stats.median, Some(-1.5));
        assert_eq!(stats.std, Some(0.0));
    }

    proptest! {
        #[test]
        fn prop_median_order_invariant(mut values in prop::collection::vec(-70.0f64..10.0, 1..40)) {
            let before = median(&values).unwrap();
            values.reverse();
            prop_assert_eq!(median(&values).unwrap(), before);
            values.sort_by(f64::total_cmp);
            prop_assert_eq!(median(&values).unwrap(), before);
        }

        #[test]
        fn prop_std_dev_non_negative(values in prop::collection::vec(-70.0f64..10.0, 0..40)) {
            prop_assert!(sample_std_dev(&values) >= 0.0);
        }

        #[test]
        fn prop_std_dev_zero_for_short_input(values in prop::collection::vec(-70.0f64..10.0, 0..2)) {
            prop_assert_eq!(sample_std_dev(&values), 0.0);
        }
    }
}
