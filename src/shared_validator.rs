use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use log::debug;
use tokio::sync::Mutex;

use crate::corpus::ProductCorpus;
use crate::observation::Observation;
use crate::running_stats::{RunningStats, StatsError};
use crate::validator::{build_ledgers, Decision, ProductLedger, Sensitivity, ValidationError};

/// [`crate::validator::ChebyshevValidator`] for concurrent callers.
///
/// Each product sits behind its own lock, held for the whole check-then-commit so two
/// candidates for one product can never both validate against the same stale statistics.
/// The product set is fixed at construction.
pub struct SharedValidator {
  sensitivity: Sensitivity,
  ledgers: HashMap<String, Arc<Mutex<ProductLedger>>>,
}

impl SharedValidator {
  pub fn new(corpus: ProductCorpus, sensitivity: Sensitivity) -> Result<Self, StatsError> {
    let ledgers = build_ledgers(corpus)?
        .into_iter()
        .map(|(name, ledger)| (name, Arc::new(Mutex::new(ledger))))
        .collect();
    Ok(Self { sensitivity, ledgers })
  }

  pub async fn try_insert(&self, candidate: Observation) -> Result<Decision, ValidationError> {
    let ledger = self.ledger(&candidate.product_name)?;
    let mut ledger = ledger.lock().await;
    Ok(ledger.try_insert(candidate, self.sensitivity))
  }

  /// Validates a batch, returning one result per candidate in input order.
  ///
  /// Candidates for the same product are applied in the order given; different products are
  /// driven concurrently.
  pub async fn try_insert_all(
      &self,
      candidates: Vec<Observation>,
  ) -> Vec<Result<Decision, ValidationError>> {
    let total = candidates.len();
    let mut by_product: BTreeMap<String, Vec<(usize, Observation)>> = BTreeMap::new();
    for (position, candidate) in candidates.into_iter().enumerate() {
      by_product
          .entry(candidate.product_name.clone())
          .or_default()
          .push((position, candidate));
    }
    debug!("validating {total} candidates across {} products", by_product.len());

    let per_product = by_product.into_values().map(|batch| async move {
      let mut decided = Vec::with_capacity(batch.len());
      for (position, candidate) in batch {
        decided.push((position, self.try_insert(candidate).await));
      }
      decided
    });

    let mut results: Vec<Option<Result<Decision, ValidationError>>> =
        (0..total).map(|_| None).collect();
    for (position, result) in join_all(per_product).await.into_iter().flatten() {
      results[position] = Some(result);
    }
    results.into_iter().flatten().collect()
  }

  pub async fn snapshot(&self, product_name: &str) -> Option<RunningStats> {
    let ledger = self.ledgers.get(product_name)?;
    let ledger = ledger.lock().await;
    Some(*ledger.stats())
  }

  /// Copies the current observations of every product into a fresh corpus.
  pub async fn corpus(&self) -> ProductCorpus {
    let mut corpus = ProductCorpus::new();
    let mut names: Vec<&String> = self.ledgers.keys().collect();
    names.sort();
    for name in names {
      let ledger = self.ledgers[name].lock().await;
      for observation in ledger.observations() {
        corpus.push(observation.clone());
      }
    }
    corpus
  }

  fn ledger(&self, product_name: &str) -> Result<&Arc<Mutex<ProductLedger>>, ValidationError> {
    self.ledgers
        .get(product_name)
        .ok_or_else(|| ValidationError::UnknownProduct(product_name.to_owned()))
  }
}
