use std::collections::BTreeMap;

use log::{debug, trace};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::corpus::ProductCorpus;
use crate::observation::Observation;
use crate::running_stats::{RunningStats, StatsError};

#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum ValidationError {
    #[error("no statistics established for product {0:?}")]
    UnknownProduct(String),
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize)]
pub enum RejectionReason {
    PriceImplausible,
    AmountImplausible,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::PriceImplausible => "Value of price is unlikely, are you sure?",
            RejectionReason::AmountImplausible => "Value of amount is unlikely, are you sure?",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize)]
pub enum Decision {
    Accepted,
    Rejected(RejectionReason),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

/// The `1 - ε` of Chebyshev's inequality; lower values give a tighter bound.
#[derive(Debug, PartialEq, Copy, Clone, Serialize)]
pub struct Sensitivity(f64);

impl Sensitivity {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidSensitivity(value))
        }
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Sensitivity {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

pub fn chebyshev_bound(variance: f64, sensitivity: Sensitivity) -> f64 {
    (variance / sensitivity.get()).sqrt()
}

/// One product's history together with the statistics derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductLedger {
    observations: Vec<Observation>,
    stats: RunningStats,
}

impl ProductLedger {
    pub fn from_observations(observations: Vec<Observation>) -> Result<Self, StatsError> {
        let stats = RunningStats::from_batch(&observations)?;
        Ok(Self { observations, stats })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }

    /// Checks `candidate` against the current statistics and commits it if plausible.
    ///
    /// Nothing is modified on rejection.
    pub fn try_insert(&mut self, candidate: Observation, sensitivity: Sensitivity) -> Decision {
        let stats = &self.stats;
        if is_implausible(stats.mean_price, stats.var_price, candidate.price, sensitivity) {
            debug!("{}: rejecting price {}", candidate.product_name, candidate.price);
            return Decision::Rejected(RejectionReason::PriceImplausible);
        }
        let amount = candidate.amount as f64;
        if is_implausible(stats.mean_amount, stats.var_amount, amount, sensitivity) {
            debug!("{}: rejecting amount {}", candidate.product_name, candidate.amount);
            return Decision::Rejected(RejectionReason::AmountImplausible);
        }

        self.stats.update(candidate.price, candidate.amount);
        trace!(
            "{}: accepted ({}, {}), now {:?}",
            candidate.product_name, candidate.price, candidate.amount, self.stats);
        self.observations.push(candidate);
        Decision::Accepted
    }
}

fn is_implausible(mean: f64, variance: f64, value: f64, sensitivity: Sensitivity) -> bool {
    let bound = chebyshev_bound(variance, sensitivity);
    let deviation = (value - mean).abs();
    debug!(
        "mean {mean}, variance {variance}, sensitivity {}: |{value} - mean| = {deviation}, \
         bound {bound}",
        sensitivity.get());
    deviation.is_nan() || bound.is_nan() || deviation > bound
}

/// Admits new entries only when they are plausible under each product's running statistics.
pub struct ChebyshevValidator {
    sensitivity: Sensitivity,
    ledgers: BTreeMap<String, ProductLedger>,
}

impl ChebyshevValidator {
    pub fn new(corpus: ProductCorpus, sensitivity: Sensitivity) -> Result<Self, StatsError> {
        Ok(Self { sensitivity, ledgers: build_ledgers(corpus)? })
    }

    pub fn try_insert(&mut self, candidate: Observation) -> Result<Decision, ValidationError> {
        let ledger = self
            .ledgers
            .get_mut(&candidate.product_name)
            .ok_or_else(|| ValidationError::UnknownProduct(candidate.product_name.clone()))?;
        Ok(ledger.try_insert(candidate, self.sensitivity))
    }

    pub fn stats(&self, product_name: &str) -> Option<&RunningStats> {
        self.ledgers.get(product_name).map(ProductLedger::stats)
    }

    pub fn observations(&self, product_name: &str) -> Option<&[Observation]> {
        self.ledgers.get(product_name).map(ProductLedger::observations)
    }

    pub fn into_corpus(self) -> ProductCorpus {
        ProductCorpus::from_observations(
            self.ledgers.into_values().flat_map(ProductLedger::into_observations))
    }
}

pub(crate) fn build_ledgers(
    corpus: ProductCorpus,
) -> Result<BTreeMap<String, ProductLedger>, StatsError> {
    corpus
        .into_inner()
        .into_iter()
        .map(|(name, observations)| {
            ProductLedger::from_observations(observations).map(|ledger| (name, ledger))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(price: f64, amount: i64) -> Observation {
        Observation::new("Parasol".to_string(), price, amount)
    }

    fn sensitivity(value: f64) -> Sensitivity {
        Sensitivity::new(value).unwrap()
    }

    /// A ledger with mean price 100 / variance 25 and mean amount 40 / variance 25.
    fn ledger() -> ProductLedger {
        ProductLedger::from_observations(vec![obs(95.0, 35), obs(105.0, 45)]).unwrap()
    }

    #[test]
    fn test_sensitivity_must_be_open_unit_interval() {
        for bad in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(Sensitivity::new(bad).is_err(), "{bad} accepted");
        }
        assert_eq!(Sensitivity::try_from(0.99).unwrap().get(), 0.99);
    }

    #[test]
    fn test_bound_formula() {
        let bound = chebyshev_bound(25.0, sensitivity(0.99));
        assert!((bound - 5.025189).abs() < 1e-6);
    }

    #[test]
    fn test_price_at_mean_accepted() {
        let mut ledger = ledger();
        assert_eq!(ledger.stats().mean_price, 100.0);
        assert_eq!(ledger.stats().var_price, 25.0);
        assert_eq!(ledger.try_insert(obs(100.0, 40), sensitivity(0.99)), Decision::Accepted);
        assert_eq!(ledger.observations().len(), 3);
        assert_eq!(ledger.stats().count, 3);
    }

    #[test]
    fn test_price_far_from_mean_rejected() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.try_insert(obs(1000.0, 40), sensitivity(0.99)),
            Decision::Rejected(RejectionReason::PriceImplausible));
    }

    #[test]
    fn test_price_checked_before_amount() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.try_insert(obs(1000.0, 4000), sensitivity(0.99)),
            Decision::Rejected(RejectionReason::PriceImplausible));
        assert_eq!(
            ledger.try_insert(obs(100.0, 4), sensitivity(0.99)),
            Decision::Rejected(RejectionReason::AmountImplausible));
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let mut ledger = ledger();
        let before = ledger.clone();
        ledger.try_insert(obs(1000.0, 40), sensitivity(0.99));
        ledger.try_insert(obs(100.0, 4), sensitivity(0.99));
        assert_eq!(ledger, before);
        assert_eq!(ledger.stats().var_price.to_bits(), before.stats().var_price.to_bits());
    }

    #[test]
    fn test_accept_uses_pre_update_stats() {
        let batch = vec![obs(90.0, 30), obs(110.0, 50)];
        let mut ledger = ProductLedger::from_observations(batch).unwrap();
        assert_eq!(ledger.try_insert(obs(100.0, 40), sensitivity(0.5)), Decision::Accepted);
        let mut expected = RunningStats::from_batch(&[obs(90.0, 30), obs(110.0, 50)]).unwrap();
        expected.update(100.0, 40);
        assert_eq!(*ledger.stats(), expected);
    }

    #[test]
    fn test_looser_sensitivity_never_rejects_more() {
        let stats_ledger = ledger();
        let candidates = (0..200).map(|i| obs(80.0 + i as f64 * 0.2, 40));
        for candidate in candidates {
            let mut previous_accepted = false;
            for s in [0.95, 0.8, 0.5, 0.2, 0.05] {
                let accepted = stats_ledger
                    .clone()
                    .try_insert(candidate.clone(), sensitivity(s))
                    .is_accepted();
                assert!(!previous_accepted || accepted, "{candidate:?} flipped to rejected at {s}");
                previous_accepted = accepted;
            }
        }
    }

    #[test]
    fn test_zero_variance_only_admits_the_mean() {
        let batch = vec![obs(10.0, 1), obs(10.0, 1)];
        let mut ledger = ProductLedger::from_observations(batch).unwrap();
        assert!(ledger.clone().try_insert(obs(10.0, 1), sensitivity(0.5)).is_accepted());
        assert_eq!(
            ledger.try_insert(obs(10.01, 1), sensitivity(0.5)),
            Decision::Rejected(RejectionReason::PriceImplausible));
    }

    #[test]
    fn test_non_finite_candidates_rejected() {
        let mut ledger = ledger();
        let before = ledger.clone();
        for price in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                ledger.try_insert(obs(price, 40), sensitivity(0.99)),
                Decision::Rejected(RejectionReason::PriceImplausible));
        }
        assert_eq!(ledger, before);
        assert_eq!(
            ledger.try_insert(obs(1e9, 40), sensitivity(0.99)),
            Decision::Rejected(RejectionReason::PriceImplausible));
        assert!(ledger.stats().mean_price.is_finite());
    }

    #[test]
    fn test_poisoned_stats_admit_nothing() {
        let batch = vec![obs(f64::NAN, 40), obs(100.0, 40)];
        let mut ledger = ProductLedger::from_observations(batch).unwrap();
        assert_eq!(
            ledger.try_insert(obs(100.0, 40), sensitivity(0.99)),
            Decision::Rejected(RejectionReason::PriceImplausible));
    }

    #[test]
    fn test_unknown_product() {
        let corpus = ProductCorpus::from_observations(vec![obs(95.0, 35), obs(105.0, 45)]);
        let mut validator = ChebyshevValidator::new(corpus, sensitivity(0.99)).unwrap();
        assert_eq!(
            validator.try_insert(Observation::new("Namiot".to_string(), 1.0, 1)),
            Err(ValidationError::UnknownProduct("Namiot".to_string())));
        assert!(validator.stats("Namiot").is_none());
    }

    #[test]
    fn test_validator_commits_into_corpus() {
        let corpus = ProductCorpus::from_observations(vec![
            obs(95.0, 35),
            obs(105.0, 45),
            Observation::new("Lornetka".to_string(), 60.0, 120),
        ]);
        let mut validator = ChebyshevValidator::new(corpus, sensitivity(0.99)).unwrap();
        assert_eq!(validator.try_insert(obs(100.0, 40)), Ok(Decision::Accepted));
        assert_eq!(
            validator.try_insert(obs(1000.0, 40)),
            Ok(Decision::Rejected(RejectionReason::PriceImplausible)));
        assert_eq!(validator.stats("Parasol").unwrap().count, 3);
        assert_eq!(validator.observations("Parasol").unwrap().len(), 3);

        let corpus = validator.into_corpus();
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.get("Parasol").unwrap().last(), Some(&obs(100.0, 40)));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            RejectionReason::PriceImplausible.message(),
            "Value of price is unlikely, are you sure?");
        assert_eq!(
            RejectionReason::AmountImplausible.message(),
            "Value of amount is unlikely, are you sure?");
    }
}
