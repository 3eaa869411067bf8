//! Constant model used when training runs out of budget

use crate::backend::TrainedModel;
use crate::data::{Dataset, Matrix, Task};
use crate::errors::{FitError, Result};

/// Predicts the majority class (classification) or the weighted target mean
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantModel {
    task: Task,
    value: f64,
    classes: Vec<f64>,
    priors: Vec<f64>,
    n_features: usize,
}

impl ConstantModel {
    pub fn fit(task: Task, data: &Dataset) -> Result<Self> {
        if data.rows() == 0 {
            return Err(FitError::EmptyDataset);
        }

        let targets = data.targets();
        let weight = |i: usize| data.sample_weight().map_or(1.0, |w| w[i]);

        let (value, classes, priors) = if task.is_classification() {
            let mut classes: Vec<f64> = targets.to_vec();
            classes.sort_by(|a, b| a.total_cmp(b));
            classes.dedup();

            let mut totals = vec![0.0; classes.len()];
            for (i, target) in targets.iter().enumerate() {
                if let Ok(slot) = classes.binary_search_by(|c| c.total_cmp(target)) {
                    totals[slot] += weight(i);
                }
            }

            let sum: f64 = totals.iter().sum();
            let priors: Vec<f64> = if sum > 0.0 {
                totals.iter().map(|t| t / sum).collect()
            } else {
                vec![1.0 / classes.len() as f64; classes.len()]
            };

            // First maximum wins, so ties go to the smallest label.
            let mut best = 0;
            for (slot, total) in totals.iter().enumerate() {
                if *total > totals[best] {
                    best = slot;
                }
            }
            (classes[best], classes, priors)
        } else {
            let (weighted, total) = targets
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(acc, norm), (i, t)| (acc + t * weight(i), norm + weight(i)));
            let mean = if total > 0.0 { weighted / total } else { 0.0 };
            (mean, Vec::new(), Vec::new())
        };

        Ok(Self {
            task,
            value,
            classes,
            priors,
            n_features: data.cols(),
        })
    }

    /// The constant prediction
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn priors(&self) -> &[f64] {
        &self.priors
    }

    fn check_shape(&self, features: &Matrix) -> Result<()> {
        if features.cols() != self.n_features {
            return Err(FitError::ShapeMismatch {
                expected: self.n_features,
                actual: features.cols(),
            });
        }
        Ok(())
    }
}

impl TrainedModel for ConstantModel {
    fn predict(&self, features: &Matrix) -> Result<Vec<f64>> {
        self.check_shape(features)?;
        Ok(vec![self.value; features.rows()])
    }

    fn predict_proba(&self, features: &Matrix) -> Result<Matrix> {
        if !self.task.is_classification() {
            return Err(FitError::Unsupported(format!(
                "predict_proba for {} task",
                self.task
            )));
        }
        self.check_shape(features)?;

        let mut values = Vec::with_capacity(features.rows() * self.priors.len());
        for _ in 0..features.rows() {
            values.extend_from_slice(&self.priors);
        }
        Matrix::new(features.rows(), self.priors.len(), values)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> Option<&[f64]> {
        if self.task.is_classification() {
            Some(&self.classes)
        } else {
            None
        }
    }

    fn units(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(targets: Vec<f64>) -> Dataset {
        let features = Matrix::zeros(targets.len(), 2);
        Dataset::new(features, targets).unwrap()
    }

    #[test]
    fn test_majority_class() {
        let model = ConstantModel::fit(Task::Multiclass, &dataset(vec![2.0, 1.0, 2.0, 0.0, 2.0])).unwrap();
        assert_eq!(model.value(), 2.0);
        assert_eq!(model.classes(), Some(&[0.0, 1.0, 2.0][..]));

        let preds = model.predict(&Matrix::zeros(3, 2)).unwrap();
        assert_eq!(preds, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_priors_follow_class_counts() {
        let model = ConstantModel::fit(Task::Binary, &dataset(vec![0.0, 1.0, 1.0, 1.0])).unwrap();
        let proba = model.predict_proba(&Matrix::zeros(2, 2)).unwrap();
        assert_eq!(proba.rows(), 2);
        assert_eq!(proba.row(0), &[0.25, 0.75]);
        assert_eq!(proba.row(1), &[0.25, 0.75]);
    }

    #[test]
    fn test_weighted_mean_for_regression() {
        let data = dataset(vec![1.0, 3.0]).with_sample_weight(vec![3.0, 1.0]).unwrap();
        let model = ConstantModel::fit(Task::Regression, &data).unwrap();
        assert!((model.value() - 1.5).abs() < 1e-12);
        assert!(model.predict_proba(&Matrix::zeros(1, 2)).is_err());
        assert_eq!(model.classes(), None);
    }

    #[test]
    fn test_shape_checked() {
        let model = ConstantModel::fit(Task::Regression, &dataset(vec![1.0])).unwrap();
        assert!(matches!(
            model.predict(&Matrix::zeros(1, 5)),
            Err(FitError::ShapeMismatch { expected: 2, actual: 5 })
        ));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        assert!(matches!(
            ConstantModel::fit(Task::Regression, &dataset(Vec::new())),
            Err(FitError::EmptyDataset)
        ));
    }
}
