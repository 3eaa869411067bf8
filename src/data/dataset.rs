//! Dense feature matrices and training datasets

use crate::errors::{FitError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Row-major dense matrix of `f64` values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Matrix {
    /// Build a matrix from row-major values
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(FitError::ShapeMismatch {
                expected: rows * cols,
                actual: values.len(),
            });
        }
        Ok(Self { rows, cols, values })
    }

    /// Matrix of zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    /// Build from a slice of equally sized rows
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut values = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(FitError::ShapeMismatch {
                    expected: cols,
                    actual: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            values,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow one row
    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.cols;
        &self.values[start..start + self.cols]
    }

    /// Single element
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// Mutable single element
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.cols + col] = value;
    }

    /// Raw row-major values
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Training data: features, targets and optional sample weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    features: Matrix,
    targets: Vec<f64>,
    sample_weight: Option<Vec<f64>>,
}

impl Dataset {
    /// Pair a feature matrix with one target per row
    pub fn new(features: Matrix, targets: Vec<f64>) -> Result<Self> {
        if targets.len() != features.rows() {
            return Err(FitError::ShapeMismatch {
                expected: features.rows(),
                actual: targets.len(),
            });
        }
        Ok(Self {
            features,
            targets,
            sample_weight: None,
        })
    }

    /// Attach per-row sample weights
    pub fn with_sample_weight(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.targets.len() {
            return Err(FitError::ShapeMismatch {
                expected: self.targets.len(),
                actual: weights.len(),
            });
        }
        self.sample_weight = Some(weights);
        Ok(self)
    }

    /// Random regression or classification data for workloads and demos.
    ///
    /// Targets are a noisy linear function of the features; with `classes`
    /// set they are bucketed into that many integer labels.
    pub fn synthetic(rows: usize, cols: usize, classes: Option<usize>) -> Self {
        let mut rng = rand::thread_rng();
        let coefficients: Vec<f64> = (0..cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut values = Vec::with_capacity(rows * cols);
        let mut targets = Vec::with_capacity(rows);

        for _ in 0..rows {
            let row: Vec<f64> = (0..cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let signal: f64 = row.iter().zip(&coefficients).map(|(x, c)| x * c).sum();
            let noisy = signal + rng.gen_range(-0.1..0.1);
            let target = match classes {
                Some(k) if k > 1 => {
                    let scaled = (noisy + cols as f64) / (2.0 * cols.max(1) as f64);
                    ((scaled * k as f64).floor() as i64).clamp(0, k as i64 - 1) as f64
                }
                _ => noisy,
            };
            values.extend(row);
            targets.push(target);
        }

        Self {
            features: Matrix { rows, cols, values },
            targets,
            sample_weight: None,
        }
    }

    pub fn features(&self) -> &Matrix {
        &self.features
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn sample_weight(&self) -> Option<&[f64]> {
        self.sample_weight.as_deref()
    }

    /// Number of training rows
    pub fn rows(&self) -> usize {
        self.features.rows()
    }

    /// Number of feature columns
    pub fn cols(&self) -> usize {
        self.features.cols()
    }
}
