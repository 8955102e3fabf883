use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::observation::Observation;

/// All recorded observations, grouped by product in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductCorpus {
    products: BTreeMap<String, Vec<Observation>>,
}

/// One `(index, value)` point of a product's price or amount series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub index: f64,
    pub value: f64,
}

/// Removes outliers from a series; the regression fit lives outside this crate.
pub trait OutlierCleaner {
    fn clean(&self, points: &[SeriesPoint]) -> Vec<SeriesPoint>;
}

impl ProductCorpus {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut corpus = Self::new();
        for observation in observations {
            corpus.push(observation);
        }
        corpus
    }

    pub fn push(&mut self, observation: Observation) {
        self.products
            .entry(observation.product_name.clone())
            .or_default()
            .push(observation);
    }

    pub fn get(&self, product_name: &str) -> Option<&[Observation]> {
        self.products.get(product_name).map(Vec::as_slice)
    }

    pub fn products(&self) -> impl Iterator<Item = &str> {
        self.products.keys().map(String::as_str)
    }

    /// Every observation, product by product in name order.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.products.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.products.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.products.values().all(Vec::is_empty)
    }

    pub(crate) fn into_inner(self) -> BTreeMap<String, Vec<Observation>> {
        self.products
    }

    pub fn series_points(
        &self,
        product_name: &str,
    ) -> Option<(Vec<SeriesPoint>, Vec<SeriesPoint>)> {
        let observations = self.products.get(product_name)?;
        let prices = observations
            .iter()
            .enumerate()
            .map(|(i, o)| SeriesPoint { index: i as f64, value: o.price })
            .collect();
        let amounts = observations
            .iter()
            .enumerate()
            .map(|(i, o)| SeriesPoint { index: i as f64, value: o.amount as f64 })
            .collect();
        Some((prices, amounts))
    }

    /// Rebuilds a product from cleaned series, joining the two on `index`.
    ///
    /// An observation survives only when its index is present in both cleaned series. Survivors
    /// keep the order of `cleaned_prices`, and amounts truncate toward zero. Returns `false` when
    /// the product is unknown.
    pub fn replace_series(
        &mut self,
        product_name: &str,
        cleaned_prices: &[SeriesPoint],
        cleaned_amounts: &[SeriesPoint],
    ) -> bool {
        let Some(observations) = self.products.get_mut(product_name) else {
            return false;
        };
        let amounts: HashMap<u64, f64> = cleaned_amounts
            .iter()
            .map(|point| (point.index.to_bits(), point.value))
            .collect();
        *observations = cleaned_prices
            .iter()
            .filter_map(|price| {
                let amount = amounts.get(&price.index.to_bits())?;
                Some(Observation::new(product_name.to_owned(), price.value, *amount as i64))
            })
            .collect();
        true
    }

    pub fn clean_with(&mut self, product_name: &str, cleaner: &dyn OutlierCleaner) -> bool {
        let Some((prices, amounts)) = self.series_points(product_name) else {
            return false;
        };
        let cleaned_prices = cleaner.clean(&prices);
        let cleaned_amounts = cleaner.clean(&amounts);
        self.replace_series(product_name, &cleaned_prices, &cleaned_amounts)
    }
}
