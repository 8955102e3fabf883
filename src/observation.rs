use derive_new::new;
use serde::{Deserialize, Serialize};

/// A single recorded (price, amount) entry for one product.
#[derive(new, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub product_name: String,
    pub price: f64,
    pub amount: i64,
}

/// Bounds and anomaly rate used to synthesize one product's history.
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub min_price: f64,
    pub max_price: f64,
    pub min_amount: i64,
    pub max_amount: i64,
    pub anomaly_probability: f64,
}

#[derive(new, Debug, Clone, PartialEq)]
pub struct ProductSpec {
    pub name: String,
    pub sample_size: usize,
    pub distribution: DistributionSpec,
}
