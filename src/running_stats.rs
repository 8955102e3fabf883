use serde::Serialize;
use thiserror::Error;

use crate::observation::Observation;

#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum StatsError {
    #[error("cannot derive statistics from an empty batch")]
    EmptyBatch,
}

/// Per-product count, mean and population variance of price and amount.
///
/// Built once from a batch, then only ever advanced one accepted entry at a time through
/// [`RunningStats::update`]; it is never recomputed from the corpus afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunningStats {
    pub count: usize,
    pub mean_price: f64,
    pub mean_amount: f64,
    pub var_price: f64,
    pub var_amount: f64,
}

impl RunningStats {
    pub fn from_batch(observations: &[Observation]) -> Result<Self, StatsError> {
        if observations.is_empty() {
            return Err(StatsError::EmptyBatch);
        }
        let n = observations.len() as f64;

        let mean_price = observations.iter().map(|o| o.price).sum::<f64>() / n;
        let mean_amount = observations.iter().map(|o| o.amount as f64).sum::<f64>() / n;

        let var_price = observations
            .iter()
            .map(|o| (o.price - mean_price).powi(2))
            .sum::<f64>()
            / n;
        let var_amount = observations
            .iter()
            .map(|o| (o.amount as f64 - mean_amount).powi(2))
            .sum::<f64>()
            / n;

        Ok(Self {
            count: observations.len(),
            mean_price,
            mean_amount,
            var_price,
            var_amount,
        })
    }

    /// Folds one newly admitted entry into the statistics.
    ///
    /// With `n` the previous count and `n' = n + 1`:
    ///
    /// ```text
    /// mean' = x / n' + (n / n') * mean
    /// var'  = (1 / n') * (n * var + n * (n - 1) * (mean - mean')^2)
    /// ```
    ///
    /// The squared mean shift is weighted by `n * (n - 1)`, which is not the Welford update.
    pub fn update(&mut self, price: f64, amount: i64) {
        let prev_count = self.count as f64;
        let (mean_price, var_price) = advance(prev_count, self.mean_price, self.var_price, price);
        let (mean_amount, var_amount) =
            advance(prev_count, self.mean_amount, self.var_amount, amount as f64);
        self.count += 1;
        self.mean_price = mean_price;
        self.var_price = var_price;
        self.mean_amount = mean_amount;
        self.var_amount = var_amount;
    }

    pub fn stddev_price(&self) -> f64 {
        self.var_price.sqrt()
    }

    pub fn stddev_amount(&self) -> f64 {
        self.var_amount.sqrt()
    }
}

fn advance(n: f64, mean: f64, var: f64, value: f64) -> (f64, f64) {
    let next_n = n + 1.0;
    let next_mean = value / next_n + (n / next_n) * mean;
    let next_var = (1.0 / next_n) * (n * var + n * (n - 1.0) * (mean - next_mean).powi(2));
    (next_mean, next_var)
}
