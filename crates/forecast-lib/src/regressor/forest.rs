//! Bagged ensemble of regression trees

use super::tree::TreeLayout;
use super::{check_inputs, predict_row, to_matrix, FitError, ModelFamily, Regressor};
use crate::features::{FeatureVector, NUM_FEATURES};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_leaf: usize,
    /// Features drawn per split; `None` considers all of them
    pub max_features: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: Some(12),
            min_samples_leaf: 2,
            max_features: None,
        }
    }
}

impl ForestParams {
    fn to_smartcore(&self, seed: u64) -> RandomForestRegressorParameters {
        let leaf = self.min_samples_leaf.max(1);
        let m = self
            .max_features
            .filter(|&k| k > 0)
            .unwrap_or(NUM_FEATURES)
            .min(NUM_FEATURES);
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees.max(1))
            .with_min_samples_leaf(leaf)
            .with_min_samples_split(2 * leaf)
            .with_m(m)
            .with_seed(seed);
        match self.max_depth {
            Some(depth) => params.with_max_depth(depth),
            None => params,
        }
    }
}

/// Prediction is the mean over all trees
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct RandomForest {
    inner: Forest,
}

impl RandomForest {
    /// Bootstrap samples and feature draws come from a generator seeded
    /// with `seed`, so equal inputs give equal forests.
    pub fn fit(
        x: &[FeatureVector],
        y: &[f64],
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self, FitError> {
        check_inputs(x, y)?;
        let inner =
            RandomForestRegressor::fit(&to_matrix(x), &y.to_vec(), params.to_smartcore(seed))?;
        Ok(Self { inner })
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let layout: ForestLayout = serde_json::to_value(&self.inner)
            .and_then(serde_json::from_value)
            .map_err(|e| format!("unreadable forest: {e}"))?;
        layout.check()
    }
}

impl fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomForest").finish_non_exhaustive()
    }
}

impl Regressor for RandomForest {
    fn predict(&self, features: &FeatureVector) -> f64 {
        predict_row(features, |m| self.inner.predict(m))
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::RandomForest
    }
}

#[derive(Debug, Deserialize)]
struct ForestLayout {
    #[serde(default)]
    trees: Option<Vec<TreeLayout>>,
}

impl ForestLayout {
    fn check(&self) -> Result<(), String> {
        let trees = match &self.trees {
            Some(trees) if !trees.is_empty() => trees,
            _ => return Err("forest has no trees".to_string()),
        };
        for (i, tree) in trees.iter().enumerate() {
            tree.check().map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}
