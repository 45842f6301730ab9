//! CART regression tree

use super::{check_inputs, predict_row, to_matrix, FitError, ModelFamily, Regressor};
use crate::features::{FeatureVector, NUM_FEATURES};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;

pub(crate) type Cart = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Growth limits for a single tree
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl TreeParams {
    fn to_smartcore(&self) -> DecisionTreeRegressorParameters {
        let params = DecisionTreeRegressorParameters::default()
            .with_min_samples_split(self.min_samples_split.max(2))
            .with_min_samples_leaf(self.min_samples_leaf.max(1));
        match self.max_depth {
            Some(depth) => params.with_max_depth(depth),
            None => params,
        }
    }
}

/// Binary regression tree, root at node 0
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTree {
    inner: Cart,
}

impl DecisionTree {
    pub fn fit(x: &[FeatureVector], y: &[f64], params: &TreeParams) -> Result<Self, FitError> {
        check_inputs(x, y)?;
        let inner = DecisionTreeRegressor::fit(&to_matrix(x), &y.to_vec(), params.to_smartcore())?;
        Ok(Self { inner })
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let layout: TreeLayout = serde_json::to_value(&self.inner)
            .and_then(serde_json::from_value)
            .map_err(|e| format!("unreadable tree: {e}"))?;
        layout.check()
    }
}

impl fmt::Debug for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionTree").finish_non_exhaustive()
    }
}

impl Regressor for DecisionTree {
    fn predict(&self, features: &FeatureVector) -> f64 {
        predict_row(features, |m| self.inner.predict(m))
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::DecisionTree
    }
}

/// The parts of a serialized tree that prediction walks
#[derive(Debug, Deserialize)]
pub(crate) struct TreeLayout {
    nodes: Vec<NodeLayout>,
}

#[derive(Debug, Deserialize)]
struct NodeLayout {
    #[serde(default)]
    output: Option<f64>,
    #[serde(default)]
    split_feature: Option<usize>,
    #[serde(default)]
    split_value: Option<f64>,
    #[serde(default)]
    true_child: Option<usize>,
    #[serde(default)]
    false_child: Option<usize>,
}

impl TreeLayout {
    /// Every split must name a real feature and point strictly forward,
    /// so a walk from the root always ends at a leaf.
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (id, node) in self.nodes.iter().enumerate() {
            if node.output.is_some_and(|v| !v.is_finite()) {
                return Err(format!("node {id} has a non-finite output"));
            }
            match (node.true_child, node.false_child) {
                (None, None) => {}
                (Some(t), Some(f)) => {
                    for child in [t, f] {
                        if child <= id || child >= len {
                            return Err(format!("node {id} points to invalid child {child}"));
                        }
                    }
                    match node.split_feature {
                        Some(feature) if feature < NUM_FEATURES => {}
                        other => {
                            return Err(format!("node {id} splits on unknown feature {other:?}"))
                        }
                    }
                    if !node.split_value.is_some_and(f64::is_finite) {
                        return Err(format!("node {id} has no finite threshold"));
                    }
                }
                _ => return Err(format!("node {id} has a single child")),
            }
        }
        Ok(())
    }
}
