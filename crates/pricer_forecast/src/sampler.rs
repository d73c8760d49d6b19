//! Random walk sampler.
//!
//! A path starts at the reference price and is multiplied by one shock per
//! day:
//!
//! ```text
//! S_{d+1} = S_d * exp(σ * Z_d / sqrt(H)),   Z_d ~ N(0, 1) i.i.d.
//! ```
//!
//! With `H` daily shocks of standard deviation `σ / sqrt(H)` the terminal
//! log-return has standard deviation `σ` for every `H`. The horizon changes
//! the shape of the path, not the dispersion of its end point.

use crate::rng::WalkRng;

/// Parameters of a single random walk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomWalk {
    /// Starting price.
    pub start_price: f64,
    /// Total-horizon log-return standard deviation.
    pub volatility: f64,
    /// Number of daily shocks.
    pub horizon_days: u32,
}

impl RandomWalk {
    /// Creates walk parameters. Inputs are assumed validated.
    pub fn new(start_price: f64, volatility: f64, horizon_days: u32) -> Self {
        Self {
            start_price,
            volatility,
            horizon_days,
        }
    }

    /// Per-day shock scale, `σ / sqrt(H)`.
    #[inline]
    pub fn daily_scale(&self) -> f64 {
        self.volatility / (self.horizon_days as f64).sqrt()
    }

    /// Simulates one path and returns its terminal price.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pricer_forecast::rng::WalkRng;
    /// use pricer_forecast::sampler::RandomWalk;
    ///
    /// let walk = RandomWalk::new(100.0, 0.2, 30);
    /// let mut rng = WalkRng::from_seed(1);
    /// let terminal = walk.sample(&mut rng);
    /// assert!(terminal > 0.0);
    /// ```
    #[inline]
    pub fn sample(&self, rng: &mut WalkRng) -> f64 {
        let scale = self.daily_scale();
        let mut price = self.start_price;
        for _ in 0..self.horizon_days {
            price *= (scale * rng.gen_normal()).exp();
        }
        price
    }

    /// Fills `out` with independent terminal prices.
    pub fn sample_into(&self, rng: &mut WalkRng, out: &mut [f64]) {
        for slot in out.iter_mut() {
            *slot = self.sample(rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_daily_scale() {
        let walk = RandomWalk::new(100.0, 0.2, 4);
        assert_relative_eq!(walk.daily_scale(), 0.1);
    }

    #[test]
    fn test_terminal_prices_positive() {
        let walk = RandomWalk::new(50_000.0, 0.8, 365);
        let mut rng = WalkRng::from_seed(99);
        let mut out = vec![0.0; 500];
        walk.sample_into(&mut rng, &mut out);
        assert!(out.iter().all(|p| *p > 0.0 && p.is_finite()));
    }

    #[test]
    fn test_sampling_is_seed_deterministic() {
        let walk = RandomWalk::new(100.0, 0.3, 10);
        let a = walk.sample(&mut WalkRng::from_seed(5));
        let b = walk.sample(&mut WalkRng::from_seed(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_day_log_return_dispersion() {
        let walk = RandomWalk::new(1.0, 0.25, 1);
        let mut rng = WalkRng::from_seed(11);
        let n = 50_000;
        let logs: Vec<f64> = (0..n).map(|_| walk.sample(&mut rng).ln()).collect();
        let mean = logs.iter().sum::<f64>() / n as f64;
        let sd = (logs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
        assert_relative_eq!(sd, 0.25, epsilon = 0.005);
    }
}
