//! Ordinary least squares linear regression

use super::{check_inputs, FitError, ModelFamily, Regressor};
use crate::features::{FeatureVector, NUM_FEATURES};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};

type Solver = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// `y = intercept + Σ coefficients[i] * x[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: [f64; NUM_FEATURES],
}

impl LinearModel {
    pub fn new(intercept: f64, coefficients: [f64; NUM_FEATURES]) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    /// Least squares fit with smartcore's SVD solver
    ///
    /// Columns that never vary are left out of the solve and get a zero
    /// coefficient, so a training set where every row has the same
    /// condition code still fits.
    pub fn fit(x: &[FeatureVector], y: &[f64]) -> Result<Self, FitError> {
        check_inputs(x, y)?;

        let varying: Vec<usize> = (0..NUM_FEATURES)
            .filter(|&j| x.iter().any(|row| row.get(j) != x[0].get(j)))
            .collect();
        if varying.is_empty() {
            let mean = y.iter().sum::<f64>() / y.len() as f64;
            return Ok(Self::new(mean, [0.0; NUM_FEATURES]));
        }

        let values = x
            .iter()
            .flat_map(|row| varying.iter().map(move |&j| row.get(j)))
            .collect();
        let matrix = DenseMatrix::new(x.len(), varying.len(), values, false);
        let solver: Solver =
            LinearRegression::fit(&matrix, &y.to_vec(), LinearRegressionParameters::default())?;

        // Read the fitted plane back at the origin and at each unit vector
        let width = varying.len();
        let mut basis = vec![0.0; (width + 1) * width];
        for k in 0..width {
            basis[(k + 1) * width + k] = 1.0;
        }
        let at = solver.predict(&DenseMatrix::new(width + 1, width, basis, false))?;
        if at.len() != width + 1 {
            return Err(FitError::Solver(format!(
                "expected {} basis predictions, got {}",
                width + 1,
                at.len()
            )));
        }

        let intercept = at[0];
        let mut coefficients = [0.0; NUM_FEATURES];
        for (k, &j) in varying.iter().enumerate() {
            coefficients[j] = at[k + 1] - intercept;
        }

        let model = Self::new(intercept, coefficients);
        model.validate().map_err(FitError::Solver)?;
        Ok(model)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.intercept.is_finite() || !self.coefficients.iter().all(|c| c.is_finite()) {
            return Err("linear model has non-finite parameters".to_string());
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.as_slice())
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Linear
    }
}
