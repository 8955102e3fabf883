//! Simulated data-entry mistakes applied to otherwise clean values.
//!
//! Every function here draws only from the generator it is handed, so a seeded generator and a
//! fixed call order always reproduce the same corruption.

use log::trace;
use rand::Rng;

const PRICE_MISSING_SEPARATOR_CUTOFF: f64 = 0.3;
const MISPLACED_SEPARATOR_CUTOFF: f64 = 0.9;
const PRICE_MISSING_SEPARATOR_FACTOR: f64 = 100.0;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum AnomalyKind {
  /// Decimal separator dropped, value scaled up by 100.
  MissingSeparator,
  /// Decimal separator moved; the value is scaled by `10^exponent`.
  MisplacedSeparator { exponent: i32 },
  /// Nothing was typed in.
  NotEntered,
}

pub fn inject_price_anomaly<R: Rng + ?Sized>(clean: f64, rng: &mut R) -> f64 {
  inject_price_anomaly_with_kind(clean, rng).0
}

pub fn inject_price_anomaly_with_kind<R: Rng + ?Sized>(
    clean: f64,
    rng: &mut R,
) -> (f64, AnomalyKind) {
  let oracle: f64 = rng.gen();
  if oracle < PRICE_MISSING_SEPARATOR_CUTOFF {
    (clean * PRICE_MISSING_SEPARATOR_FACTOR, AnomalyKind::MissingSeparator)
  } else if oracle < MISPLACED_SEPARATOR_CUTOFF {
    let exponent = rng.gen_range(0..4) - 3;
    (clean * 10f64.powi(exponent), AnomalyKind::MisplacedSeparator { exponent })
  } else {
    (0.0, AnomalyKind::NotEntered)
  }
}

pub fn inject_amount_anomaly<R: Rng + ?Sized>(clean: i64, rng: &mut R) -> i64 {
  inject_amount_anomaly_with_kind(clean, rng).0
}

pub fn inject_amount_anomaly_with_kind<R: Rng + ?Sized>(
    clean: i64,
    rng: &mut R,
) -> (i64, AnomalyKind) {
  let oracle: f64 = rng.gen();
  if oracle < MISPLACED_SEPARATOR_CUTOFF {
    let exponent = rng.gen_range(0..4) - 2;
    (scale_by_power_of_ten(clean, exponent), AnomalyKind::MisplacedSeparator { exponent })
  } else {
    (0, AnomalyKind::NotEntered)
  }
}

/// Integer scaling, truncating toward zero for negative exponents.
fn scale_by_power_of_ten(value: i64, exponent: i32) -> i64 {
  let factor = 10i64.pow(exponent.unsigned_abs());
  if exponent >= 0 {
    value.saturating_mul(factor)
  } else {
    value / factor
  }
}

/// Decides per element whether a value gets corrupted at all.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AnomalyInjector {
  probability: f64,
}

impl AnomalyInjector {
  pub fn new(probability: f64) -> Self {
    Self { probability }
  }

  pub fn maybe_corrupt_price<R: Rng + ?Sized>(&self, clean: f64, rng: &mut R) -> f64 {
    if !self.roll(rng) {
      return clean;
    }
    let (corrupted, kind) = inject_price_anomaly_with_kind(clean, rng);
    trace!("price anomaly {kind:?}: {clean} -> {corrupted}");
    corrupted
  }

  pub fn maybe_corrupt_amount<R: Rng + ?Sized>(&self, clean: i64, rng: &mut R) -> i64 {
    if !self.roll(rng) {
      return clean;
    }
    let (corrupted, kind) = inject_amount_anomaly_with_kind(clean, rng);
    trace!("amount anomaly {kind:?}: {clean} -> {corrupted}");
    corrupted
  }

  fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
    rng.gen::<f64>() < self.probability
  }
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  use super::*;

  #[test]
  fn test_price_anomaly_stays_in_taxonomy() {
    let mut rng = StdRng::seed_from_u64(7);
    let allowed = [100.0, 1.0, 0.1, 0.01, 0.001, 0.0];
    for _ in 0..1000 {
      let corrupted = inject_price_anomaly(50.0, &mut rng);
      let ratio = corrupted / 50.0;
      assert!(
        allowed.iter().any(|a| (ratio - a).abs() < 1e-12),
        "unexpected multiplier {ratio}");
    }
  }

  #[test]
  fn test_price_anomaly_kinds_match_values() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut seen_missing = false;
    let mut seen_misplaced = false;
    let mut seen_not_entered = false;
    for _ in 0..1000 {
      match inject_price_anomaly_with_kind(20.0, &mut rng) {
        (value, AnomalyKind::MissingSeparator) => {
          assert_eq!(value, 2000.0);
          seen_missing = true;
        }
        (value, AnomalyKind::MisplacedSeparator { exponent }) => {
          assert!((-3..=0).contains(&exponent));
          assert_eq!(value, 20.0 * 10f64.powi(exponent));
          seen_misplaced = true;
        }
        (value, AnomalyKind::NotEntered) => {
          assert_eq!(value, 0.0);
          seen_not_entered = true;
        }
      }
    }
    assert!(seen_missing && seen_misplaced && seen_not_entered);
  }

  #[test]
  fn test_amount_anomaly_stays_in_taxonomy() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..1000 {
      let corrupted = inject_amount_anomaly(350, &mut rng);
      assert!([3, 35, 350, 3500, 0].contains(&corrupted), "unexpected amount {corrupted}");
    }
  }

  #[test]
  fn test_amount_exponent_range() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..500 {
      if let (_, AnomalyKind::MisplacedSeparator { exponent }) =
          inject_amount_anomaly_with_kind(10, &mut rng) {
        assert!((-2..=1).contains(&exponent));
      }
    }
  }

  #[test]
  fn test_same_seed_same_corruption() {
    let mut a = StdRng::seed_from_u64(42);
    let mut b = StdRng::seed_from_u64(42);
    let injector = AnomalyInjector::new(0.5);
    for i in 0..200 {
      let clean = 10.0 + i as f64;
      assert_eq!(
        injector.maybe_corrupt_price(clean, &mut a).to_bits(),
        injector.maybe_corrupt_price(clean, &mut b).to_bits());
      assert_eq!(
        injector.maybe_corrupt_amount(i, &mut a),
        injector.maybe_corrupt_amount(i, &mut b));
    }
  }

  #[test]
  fn test_zero_probability_is_identity() {
    let mut rng = StdRng::seed_from_u64(1);
    let injector = AnomalyInjector::new(0.0);
    for i in 0..100 {
      assert_eq!(injector.maybe_corrupt_price(i as f64, &mut rng), i as f64);
      assert_eq!(injector.maybe_corrupt_amount(i, &mut rng), i);
    }
  }

  #[test]
  fn test_certain_probability_always_draws_taxonomy() {
    let mut rng = StdRng::seed_from_u64(9);
    let injector = AnomalyInjector::new(1.0);
    for _ in 0..100 {
      let value = injector.maybe_corrupt_price(10.0, &mut rng);
      assert!(value == 0.0 || value == 1000.0 || value <= 10.0);
    }
  }
}
