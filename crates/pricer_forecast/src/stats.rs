//! Statistics aggregation over a run's terminal prices.
//!
//! | Metric  | Definition |
//! |---------|------------|
//! | lowest  | minimum terminal price |
//! | highest | maximum terminal price |
//! | average | arithmetic mean |
//! | target  | mean + one population standard deviation |
//!
//! Every metric is also reported as a signed percentage change against the
//! reference price, rounded to two decimals.

use serde::{Deserialize, Serialize};

/// Rounds to `decimals` decimal places, half away from zero.
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `(value - reference) / reference * 100`, rounded to two decimals.
///
/// # Examples
///
/// ```rust
/// use pricer_forecast::stats::percent_change;
///
/// assert_eq!(percent_change(110.0, 100.0), 10.0);
/// assert_eq!(percent_change(50.0, 100.0), -50.0);
/// ```
#[inline]
pub fn percent_change(value: f64, reference: f64) -> f64 {
    round_to((value - reference) / reference * 100.0, 2)
}

/// Summary statistics of one run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Number of terminal prices summarised.
    pub count: usize,
    /// Minimum terminal price.
    pub lowest: f64,
    /// Maximum terminal price.
    pub highest: f64,
    /// Arithmetic mean.
    pub average: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// `average + std_dev`.
    pub target: f64,
}

impl RunStatistics {
    /// Computes the statistics, or `None` for an empty slice.
    ///
    /// Two passes: the mean first, then the squared deviations from it.
    /// A single price yields a standard deviation of zero and a target equal
    /// to the average.
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        if prices.is_empty() {
            return None;
        }

        let count = prices.len();
        let mut lowest = f64::INFINITY;
        let mut highest = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &p in prices {
            lowest = lowest.min(p);
            highest = highest.max(p);
            sum += p;
        }
        // Rounding in the mean can leave it a hair outside [min, max].
        let average = (sum / count as f64).clamp(lowest, highest);

        let variance = prices
            .iter()
            .map(|p| {
                let d = p - average;
                d * d
            })
            .sum::<f64>()
            / count as f64;
        let std_dev = variance.sqrt();

        Some(Self {
            count,
            lowest,
            highest,
            average,
            std_dev,
            target: average + std_dev,
        })
    }
}

/// A value and its percentage change against the reference price.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    /// Price level.
    pub value: f64,
    /// Signed percentage change, two decimals.
    pub change_pct: f64,
}

impl PricePoint {
    /// Builds a point relative to `reference`.
    pub fn relative_to(value: f64, reference: f64) -> Self {
        Self {
            value,
            change_pct: percent_change(value, reference),
        }
    }
}

/// Externally served summary of the latest run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Reference price the run started from.
    pub current: PricePoint,
    /// Highest terminal price.
    pub highest: PricePoint,
    /// Mean plus one standard deviation.
    pub target: PricePoint,
    /// Mean terminal price.
    pub average: PricePoint,
    /// Lowest terminal price.
    pub lowest: PricePoint,
}

impl Overview {
    /// Expresses `stats` relative to `reference`.
    pub fn from_statistics(stats: &RunStatistics, reference: f64) -> Self {
        Self {
            current: PricePoint::relative_to(reference, reference),
            highest: PricePoint::relative_to(stats.highest, reference),
            target: PricePoint::relative_to(stats.target, reference),
            average: PricePoint::relative_to(stats.average, reference),
            lowest: PricePoint::relative_to(stats.lowest, reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-1.235, 1), -1.2);
        assert_eq!(round_to(2.5, 0), 3.0);
    }

    #[test]
    fn test_percent_change_signed() {
        assert_eq!(percent_change(100.0, 100.0), 0.0);
        assert_eq!(percent_change(101.234, 100.0), 1.23);
        assert_eq!(percent_change(98.76, 100.0), -1.24);
    }

    #[test]
    fn test_statistics_known_values() {
        let stats = RunStatistics::from_prices(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert_eq!(stats.lowest, 2.0);
        assert_eq!(stats.highest, 9.0);
        assert_relative_eq!(stats.average, 5.0);
        assert_relative_eq!(stats.std_dev, 2.0);
        assert_relative_eq!(stats.target, 7.0);
    }

    #[test]
    fn test_single_price_target_equals_average() {
        let stats = RunStatistics::from_prices(&[42.0]).unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.target, stats.average);
        assert_eq!(stats.lowest, stats.highest);
    }

    #[test]
    fn test_empty_prices() {
        assert!(RunStatistics::from_prices(&[]).is_none());
    }

    #[test]
    fn test_order_statistics_consistency() {
        let prices: Vec<f64> = (1..=1000).map(|i| (i as f64).sqrt() * 13.7).collect();
        let stats = RunStatistics::from_prices(&prices).unwrap();
        assert!(stats.lowest <= stats.average);
        assert!(stats.average <= stats.highest);
        assert!(stats.target >= stats.average);
    }

    #[test]
    fn test_overview_relative_to_reference() {
        let stats = RunStatistics::from_prices(&[90.0, 110.0]).unwrap();
        let overview = Overview::from_statistics(&stats, 100.0);

        assert_eq!(overview.current.value, 100.0);
        assert_eq!(overview.current.change_pct, 0.0);
        assert_eq!(overview.highest.change_pct, 10.0);
        assert_eq!(overview.lowest.change_pct, -10.0);
        assert_eq!(overview.average.change_pct, 0.0);
        assert_eq!(overview.target.value, 110.0);
        assert_eq!(overview.target.change_pct, 10.0);
    }
}
