use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observation::{DistributionSpec, ProductSpec};
use crate::validator::Sensitivity;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("sensitivity must lie strictly between 0 and 1, got {0}")]
    InvalidSensitivity(f64),
    #[error("anomaly probability for {scope} must lie within [0, 1], got {value}")]
    InvalidAnomalyProbability { scope: String, value: f64 },
    #[error("no products configured")]
    NoProducts,
    #[error("product {0:?} is configured more than once")]
    DuplicateProduct(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    pub sample_size: usize,
    pub min_price: f64,
    pub max_price: f64,
    pub min_amount: i64,
    pub max_amount: i64,
    /// Overrides [`LedgerConfig::anomaly_probability`] for this product only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub anomaly_probability: f64,
    pub sensitivity: f64,
    pub products: Vec<ProductConfig>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let product = |name: &str, prices: (f64, f64), amounts: (i64, i64)| ProductConfig {
            name: name.to_owned(),
            sample_size: 1000,
            min_price: prices.0,
            max_price: prices.1,
            min_amount: amounts.0,
            max_amount: amounts.1,
            anomaly_probability: None,
        };
        Self {
            seed: None,
            anomaly_probability: 0.003,
            sensitivity: 0.99,
            products: vec![
                product("Parasol", (100.0, 124.0), (30, 50)),
                product("Lornetka", (50.0, 80.0), (100, 150)),
            ],
        }
    }
}

impl LedgerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the scalars and product list; distribution bounds are checked at generation time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensitivity()?;
        check_probability("all products", self.anomaly_probability)?;
        if self.products.is_empty() {
            return Err(ConfigError::NoProducts);
        }
        let mut names = HashSet::new();
        for product in &self.products {
            if !names.insert(product.name.as_str()) {
                return Err(ConfigError::DuplicateProduct(product.name.clone()));
            }
            if let Some(p) = product.anomaly_probability {
                check_probability(&product.name, p)?;
            }
        }
        Ok(())
    }

    pub fn sensitivity(&self) -> Result<Sensitivity, ConfigError> {
        Sensitivity::new(self.sensitivity)
    }

    pub fn product_specs(&self) -> Vec<ProductSpec> {
        self.products
            .iter()
            .map(|p| ProductSpec::new(
                p.name.clone(),
                p.sample_size,
                DistributionSpec::new(
                    p.min_price,
                    p.max_price,
                    p.min_amount,
                    p.max_amount,
                    p.anomaly_probability.unwrap_or(self.anomaly_probability))))
            .collect()
    }
}

fn check_probability(scope: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidAnomalyProbability { scope: scope.to_owned(), value })
    }
}
