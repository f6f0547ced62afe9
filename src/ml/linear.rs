//! Ridge regression solved through the normal equations.

use nalgebra::{DMatrix, DVector};

use super::{ModelError, ModelResult};

// ---

/// L2-regularised linear model with an unpenalised intercept.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RidgeRegression {
    // ---
    weights: Vec<f64>,
    intercept: f64,
}

impl RidgeRegression {
    // ---
    /// Fit `y ≈ X·w + b` minimising `|y − Xw − b|² + alpha·|w|²`.
    ///
    /// Features and target are centred first so the intercept absorbs the
    /// means and stays out of the penalty.
    pub(crate) fn fit(rows: &[Vec<f64>], targets: &[f64], alpha: f64) -> ModelResult<Self> {
        // ---
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(ModelError::InsufficientData);
        }
        let width = rows[0].len();
        let n = rows.len() as f64;

        let mut x_mean = vec![0.0; width];
        for row in rows {
            if row.len() != width {
                return Err(ModelError::DimensionMismatch {
                    expected: width,
                    got: row.len(),
                });
            }
            for (m, v) in x_mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let y_mean = targets.iter().sum::<f64>() / n;

        let x = DMatrix::from_fn(rows.len(), width, |i, j| rows[i][j] - x_mean[j]);
        let y = DVector::from_iterator(targets.len(), targets.iter().map(|t| t - y_mean));

        // (XᵀX + αI) w = Xᵀy
        let xt = x.transpose();
        let gram = &xt * &x + DMatrix::<f64>::identity(width, width) * alpha;
        let rhs = &xt * y;
        let weights = gram.lu().solve(&rhs).ok_or(ModelError::SingularMatrix)?;

        let intercept = y_mean - weights.iter().zip(&x_mean).map(|(w, m)| w * m).sum::<f64>();

        Ok(Self {
            weights: weights.iter().copied().collect(),
            intercept,
        })
    }

    pub(crate) fn predict(&self, row: &[f64]) -> ModelResult<f64> {
        // ---
        if row.len() != self.weights.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.weights.len(),
                got: row.len(),
            });
        }
        Ok(self.intercept + row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>())
    }
}
