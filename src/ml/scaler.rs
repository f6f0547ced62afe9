//! Per-feature standardisation, fit once at training time.

use super::{ModelError, ModelResult};

// ---

/// Zero-mean / unit-variance transform. A model and the scaler fitted on
/// its training set are always stored together.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StandardScaler {
    // ---
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    // ---
    /// Fit on row-major samples. Constant columns get a scale of 1.0.
    pub(crate) fn fit(rows: &[Vec<f64>]) -> ModelResult<Self> {
        // ---
        let first = rows.first().ok_or(ModelError::InsufficientData)?;
        let width = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            check_width(width, row)?;
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in scales.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > 0.0 { std } else { 1.0 };
        }

        Ok(Self { means, scales })
    }

    pub(crate) fn transform(&self, row: &[f64]) -> ModelResult<Vec<f64>> {
        // ---
        check_width(self.means.len(), row)?;
        Ok(row
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .map(|((v, m), s)| (v - m) / s)
            .collect())
    }

    pub(crate) fn transform_all(&self, rows: &[Vec<f64>]) -> ModelResult<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

fn check_width(expected: usize, row: &[f64]) -> ModelResult<()> {
    // ---
    if row.len() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            got: row.len(),
        });
    }
    Ok(())
}
