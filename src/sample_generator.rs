use log::{debug, info};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::anomaly_injector::AnomalyInjector;
use crate::corpus::ProductCorpus;
use crate::observation::{DistributionSpec, Observation, ProductSpec};

/// Price histories need two slots for the anchored bounds.
pub const MIN_SAMPLE_SIZE: usize = 2;

#[derive(Error, PartialEq, Clone, Debug)]
pub enum GenerationError {
  #[error("product {product:?}: sample size {sample_size} is below the minimum of 2")]
  InvalidSampleSize { product: String, sample_size: usize },
  #[error("product {product:?}: {reason}")]
  InvalidDistribution { product: String, reason: String },
}

pub struct SampleGenerator;

impl SampleGenerator {
  /// Synthesizes one product's history from `seed`.
  ///
  /// Prices are drawn first (sorted, with `min_price` and `max_price` anchored at either end),
  /// then amounts; anomalies are injected into both from the same generator. The `sample_size`
  /// argument decides how many samples are drawn; `spec.sample_size` is only what
  /// [`generate_corpus`] passes here.
  pub fn generate(
      spec: &ProductSpec,
      sample_size: usize,
      seed: u64,
  ) -> Result<Vec<Observation>, GenerationError> {
    if sample_size < MIN_SAMPLE_SIZE {
      return Err(GenerationError::InvalidSampleSize {
        product: spec.name.clone(),
        sample_size,
      });
    }
    check_distribution(&spec.name, &spec.distribution)?;

    let dist = &spec.distribution;
    let injector = AnomalyInjector::new(dist.anomaly_probability);
    let mut rng = StdRng::seed_from_u64(seed);

    let prices = Self::create_prices(dist, &injector, sample_size, &mut rng);
    let amounts = Self::create_amounts(dist, &injector, sample_size, &mut rng);

    debug!("generated {sample_size} samples for {} (seed {seed})", spec.name);
    Ok(prices
        .into_iter()
        .zip(amounts)
        .map(|(price, amount)| Observation::new(spec.name.clone(), price, amount))
        .collect())
  }

  fn create_prices(
      dist: &DistributionSpec,
      injector: &AnomalyInjector,
      sample_size: usize,
      rng: &mut StdRng,
  ) -> Vec<f64> {
    let uniform = Uniform::new_inclusive(dist.min_price, dist.max_price);

    let mut prices = Vec::with_capacity(sample_size);
    prices.push(dist.min_price);
    let mut drawn: Vec<f64> = (0..sample_size - 2).map(|_| uniform.sample(rng)).collect();
    drawn.sort_by(|a, b| a.total_cmp(b));
    prices.append(&mut drawn);
    prices.push(dist.max_price);

    prices
        .into_iter()
        .map(|price| injector.maybe_corrupt_price(price, rng))
        .collect()
  }

  fn create_amounts(
      dist: &DistributionSpec,
      injector: &AnomalyInjector,
      sample_size: usize,
      rng: &mut StdRng,
  ) -> Vec<i64> {
    let uniform = Uniform::new_inclusive(dist.min_amount, dist.max_amount);
    let amounts: Vec<i64> = (0..sample_size).map(|_| uniform.sample(rng)).collect();
    amounts
        .into_iter()
        .map(|amount| injector.maybe_corrupt_amount(amount, rng))
        .collect()
  }
}

/// Builds a corpus for every configured product.
///
/// Each product draws from its own generator, seeded from `seed` and the product's position in
/// `products`, so reordering products changes output but regenerating never does. Names are
/// expected to be unique ([`crate::config::LedgerConfig::validate`] checks this); a repeated name
/// merges both histories.
pub fn generate_corpus(
    products: &[ProductSpec],
    seed: u64,
) -> Result<ProductCorpus, GenerationError> {
  let mut corpus = ProductCorpus::new();
  for (index, spec) in products.iter().enumerate() {
    let product_seed = derive_product_seed(seed, index);
    for observation in SampleGenerator::generate(spec, spec.sample_size, product_seed)? {
      corpus.push(observation);
    }
  }
  info!(
    "generated corpus of {} observations across {} products",
    corpus.len(),
    products.len());
  Ok(corpus)
}

fn derive_product_seed(seed: u64, index: usize) -> u64 {
  // SplitMix64 finalizer.
  let mut x = seed ^ ((index as u64) << 1);
  x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
  x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
  x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
  x ^ (x >> 31)
}

fn check_distribution(product: &str, dist: &DistributionSpec) -> Result<(), GenerationError> {
  let invalid = |reason: String| GenerationError::InvalidDistribution {
    product: product.to_owned(),
    reason,
  };
  let (min_price, max_price) = (dist.min_price, dist.max_price);
  if !min_price.is_finite() || !max_price.is_finite() {
    return Err(invalid(format!("price bounds must be finite, got {min_price}..{max_price}")));
  }
  if min_price > max_price {
    return Err(invalid(format!("min_price {min_price} exceeds max_price {max_price}")));
  }
  // `Uniform` panics when the span itself overflows to infinity.
  if !(max_price - min_price).is_finite() {
    return Err(invalid(format!("price span {min_price}..{max_price} is not representable")));
  }
  if dist.min_amount > dist.max_amount {
    return Err(invalid(format!(
      "min_amount {} exceeds max_amount {}",
      dist.min_amount, dist.max_amount)));
  }
  let probability = dist.anomaly_probability;
  if !(0.0..=1.0).contains(&probability) {
    return Err(invalid(format!("anomaly probability {probability} outside [0, 1]")));
  }
  Ok(())
}
