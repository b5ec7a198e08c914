//! The interface a model must offer to be trained on stratified batches.
//!
//! Network construction, optimisation and the training loop itself live
//! behind this trait; the crate only prepares the tensors and drives the
//! calls.

use chrono::{DateTime, Utc};
use ndarray::{Array2, Array4, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::batching::BatchSource;
use crate::error::{Result, StrataError};
use crate::trajectory::labels::class_indices;

/// Scalar evaluation results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Fraction of samples whose predicted class matches the label.
    pub accuracy: f64,
    /// Number of samples evaluated.
    pub num_samples: usize,
}

impl Metrics {
    /// Compare predicted and expected one-hot (or score) rows by arg-max.
    pub fn from_predictions(
        predicted: ArrayView2<'_, f64>,
        expected: ArrayView2<'_, f64>,
    ) -> Result<Self> {
        if predicted.dim() != expected.dim() {
            return Err(StrataError::shape(format!(
                "predictions have shape {:?} but labels have shape {:?}",
                predicted.dim(),
                expected.dim()
            )));
        }

        let num_samples = expected.nrows();
        if num_samples == 0 {
            return Ok(Self {
                accuracy: 0.0,
                num_samples,
            });
        }

        let correct = class_indices(predicted)?
            .into_iter()
            .zip(class_indices(expected)?)
            .filter(|(p, e)| p == e)
            .count();

        Ok(Self {
            accuracy: correct as f64 / num_samples as f64,
            num_samples,
        })
    }
}

/// Metrics recorded after each training epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Epoch index (0-based).
    pub epoch: usize,
    /// Metrics on the training batches of this epoch.
    pub train: Metrics,
    /// Metrics on the validation batches, when a validation source was given.
    pub validation: Option<Metrics>,
    /// When the epoch finished.
    pub recorded_at: DateTime<Utc>,
}

/// A trainable classifier over grouped segment tensors.
pub trait Classifier {
    /// Train for `epochs` epochs of `source.batches_per_epoch()` batches each,
    /// scoring one epoch of `validation` batches after every training epoch.
    fn train(
        &mut self,
        source: &mut dyn BatchSource,
        epochs: usize,
        validation: Option<&mut dyn BatchSource>,
    ) -> Result<Vec<EpochMetrics>>;

    /// Predict one label row per input sample.
    fn predict(&self, inputs: &Array4<f64>) -> Result<Array2<f64>>;

    /// Score `inputs` against `labels`.
    fn evaluate(&self, inputs: &Array4<f64>, labels: &Array2<f64>) -> Result<Metrics> {
        let predicted = self.predict(inputs)?;
        Metrics::from_predictions(predicted.view(), labels.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_metrics_from_predictions() {
        let predicted = array![[0.9, 0.1], [0.2, 0.8], [0.6, 0.4], [0.0, 1.0]];
        let expected = array![[1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [0.0, 1.0]];
        let metrics = Metrics::from_predictions(predicted.view(), expected.view()).unwrap();
        assert_eq!(metrics.num_samples, 4);
        assert!((metrics.accuracy - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_empty() {
        let empty = Array2::<f64>::zeros((0, 3));
        let metrics = Metrics::from_predictions(empty.view(), empty.view()).unwrap();
        assert_eq!(metrics.num_samples, 0);
        assert!(metrics.accuracy.abs() < 1e-9);
    }

    #[test]
    fn test_metrics_shape_mismatch() {
        let a = Array2::<f64>::zeros((2, 3));
        let b = Array2::<f64>::zeros((2, 2));
        assert!(matches!(
            Metrics::from_predictions(a.view(), b.view()),
            Err(StrataError::InvalidShape(_))
        ));
    }
}
