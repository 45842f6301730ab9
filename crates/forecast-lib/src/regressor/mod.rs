//! Regression model families
//!
//! Every fitted model exposes the same capability through [`Regressor`].
//! [`Estimator`] is the serialized form, one variant per family. Fitting is
//! delegated to smartcore; tree ensembles are stored in smartcore's own
//! serde layout and checked with [`Estimator::validate`] before serving.

mod forest;
mod linear;
mod tree;

pub use forest::{ForestParams, RandomForest};
pub use linear::LinearModel;
pub use tree::{DecisionTree, TreeParams};

use crate::features::{FeatureVector, NUM_FEATURES};
use serde::{Deserialize, Serialize};
use smartcore::error::Failed;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;

/// A fitted model that maps a feature vector to a temperature
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> f64;

    fn family(&self) -> ModelFamily;
}

/// Supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Linear,
    RandomForest,
    DecisionTree,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::Linear,
        ModelFamily::RandomForest,
        ModelFamily::DecisionTree,
    ];

    /// Model name exposed to users
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelFamily::Linear => "Linear Regression",
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::DecisionTree => "Decision Tree",
        }
    }

    /// Artifact file stem
    pub fn file_stem(&self) -> &'static str {
        match self {
            ModelFamily::Linear => "linear_regression",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::DecisionTree => "decision_tree",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Fitting failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("no training samples")]
    Empty,
    #[error("{features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },
    #[error("non-finite value in training data")]
    NonFinite,
    #[error("solver failed: {0}")]
    Solver(String),
}

impl From<Failed> for FitError {
    fn from(e: Failed) -> Self {
        FitError::Solver(e.to_string())
    }
}

pub(crate) fn check_inputs(x: &[FeatureVector], y: &[f64]) -> Result<(), FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            features: x.len(),
            targets: y.len(),
        });
    }
    if x.is_empty() {
        return Err(FitError::Empty);
    }
    if !x.iter().all(FeatureVector::is_finite) || !y.iter().all(|v| v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    Ok(())
}

/// Row-major design matrix, one row per feature vector
pub(crate) fn to_matrix(x: &[FeatureVector]) -> DenseMatrix<f64> {
    let values = x.iter().flat_map(|f| f.as_slice().iter().copied()).collect();
    DenseMatrix::new(x.len(), NUM_FEATURES, values, false)
}

/// Run a batch predictor on a single row; NaN when it fails
pub(crate) fn predict_row<F>(features: &FeatureVector, predict: F) -> f64
where
    F: FnOnce(&DenseMatrix<f64>) -> Result<Vec<f64>, Failed>,
{
    predict(&to_matrix(std::slice::from_ref(features)))
        .ok()
        .and_then(|values| values.first().copied())
        .unwrap_or(f64::NAN)
}

/// Serialized, fitted model of any family
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Estimator {
    Linear(LinearModel),
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
}

impl Estimator {
    /// Fit a model of `family` with that family's default parameters
    pub fn fit(
        family: ModelFamily,
        x: &[FeatureVector],
        y: &[f64],
        seed: u64,
    ) -> Result<Self, FitError> {
        match family {
            ModelFamily::Linear => LinearModel::fit(x, y).map(Estimator::Linear),
            ModelFamily::RandomForest => {
                RandomForest::fit(x, y, &ForestParams::default(), seed).map(Estimator::RandomForest)
            }
            ModelFamily::DecisionTree => {
                DecisionTree::fit(x, y, &TreeParams::default()).map(Estimator::DecisionTree)
            }
        }
    }

    /// Structural checks a deserialized model must pass before it is served
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Estimator::Linear(m) => m.validate(),
            Estimator::RandomForest(m) => m.validate(),
            Estimator::DecisionTree(m) => m.validate(),
        }
    }
}

impl Regressor for Estimator {
    fn predict(&self, features: &FeatureVector) -> f64 {
        match self {
            Estimator::Linear(m) => m.predict(features),
            Estimator::RandomForest(m) => m.predict(features),
            Estimator::DecisionTree(m) => m.predict(features),
        }
    }

    fn family(&self) -> ModelFamily {
        match self {
            Estimator::Linear(_) => ModelFamily::Linear,
            Estimator::RandomForest(_) => ModelFamily::RandomForest,
            Estimator::DecisionTree(_) => ModelFamily::DecisionTree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data() -> (Vec<FeatureVector>, Vec<f64>) {
        let x: Vec<FeatureVector> = (0..40)
            .map(|i| {
                let t = i as f64;
                FeatureVector::new([
                    20.0 + t * 0.25,
                    60.0 + (i % 7) as f64,
                    1010.0 - (i % 5) as f64,
                    2.0,
                    800.0,
                ])
            })
            .collect();
        let y = x.iter().map(|f| f.get(0) + 0.5).collect();
        (x, y)
    }

    #[test]
    fn test_every_family_fits_and_reports_itself() {
        let (x, y) = toy_data();
        for family in ModelFamily::ALL {
            let estimator = Estimator::fit(family, &x, &y, 42).unwrap();
            assert_eq!(estimator.family(), family);
            assert!(estimator.predict(&x[3]).is_finite());
            assert!(estimator.validate().is_ok());
        }
    }

    #[test]
    fn test_serialization_is_tagged_and_predicts_identically() {
        let (x, y) = toy_data();
        for family in ModelFamily::ALL {
            let estimator = Estimator::fit(family, &x, &y, 42).unwrap();
            let json = serde_json::to_value(&estimator).unwrap();
            assert_eq!(json["family"], serde_json::to_value(family).unwrap());

            let restored: Estimator = serde_json::from_value(json).unwrap();
            assert_eq!(restored.family(), family);
            for row in &x {
                assert_eq!(restored.predict(row), estimator.predict(row));
            }
        }
    }

    #[test]
    fn test_input_validation() {
        let (x, y) = toy_data();
        assert_eq!(
            Estimator::fit(ModelFamily::Linear, &x, &y[..3], 42).unwrap_err(),
            FitError::LengthMismatch {
                features: 40,
                targets: 3
            }
        );
        assert_eq!(
            Estimator::fit(ModelFamily::DecisionTree, &[], &[], 42).unwrap_err(),
            FitError::Empty
        );

        let mut bad = y.clone();
        bad[0] = f64::NAN;
        assert_eq!(
            Estimator::fit(ModelFamily::RandomForest, &x, &bad, 42).unwrap_err(),
            FitError::NonFinite
        );
    }

    #[test]
    fn test_rows_reach_the_solver_in_feature_order() {
        // Only humidity carries signal; a transposed matrix would lose it
        let x: Vec<FeatureVector> = (0..30)
            .map(|i| FeatureVector::new([25.0, 40.0 + i as f64, 1010.0, 2.0, 800.0]))
            .collect();
        let y: Vec<f64> = x.iter().map(|f| 0.5 * f.get(1)).collect();
        let model = LinearModel::fit(&x, &y).unwrap();

        assert!((model.coefficients[1] - 0.5).abs() < 1e-6);
        let query = FeatureVector::new([25.0, 55.0, 1010.0, 2.0, 800.0]);
        assert!((model.predict(&query) - 27.5).abs() < 1e-6);
    }

    #[test]
    fn test_failed_row_prediction_is_nan() {
        let row = FeatureVector::new([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(predict_row(&row, |_| Ok(vec![21.5])), 21.5);
        assert!(predict_row(&row, |_| Ok(Vec::new())).is_nan());
    }

    #[test]
    fn test_family_names() {
        assert_eq!(ModelFamily::Linear.display_name(), "Linear Regression");
        assert_eq!(ModelFamily::RandomForest.file_stem(), "random_forest");
        assert_eq!(ModelFamily::DecisionTree.to_string(), "Decision Tree");
    }
}
