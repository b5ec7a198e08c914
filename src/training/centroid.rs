//! A nearest-centroid reference classifier.
//!
//! Keeps a running mean of the flattened group tensors of every class and
//! predicts the class whose mean is closest in squared Euclidean distance.
//! Small enough to run the whole pipeline without a neural network, and
//! deterministic, which makes it the classifier used by the CLI and tests.

use ndarray::{Array1, Array2, Array4, ArrayView1};
use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::batching::{Batch, BatchSource};
use crate::error::{Result, StrataError};
use crate::trajectory::labels::class_indices;

use super::classifier::{Classifier, EpochMetrics, Metrics};

/// Nearest-centroid classifier over flattened groups.
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    /// Per-class feature sums, `[classes, features]`.
    sums: Option<Array2<f64>>,
    /// Groups seen per class.
    counts: Vec<usize>,
}

impl NearestCentroid {
    /// Create an untrained classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one batch has been absorbed.
    pub fn is_trained(&self) -> bool {
        self.counts.iter().any(|&c| c > 0)
    }

    /// Current class means; classes never seen stay at zero.
    pub fn centroids(&self) -> Option<Array2<f64>> {
        let sums = self.sums.as_ref()?;
        let mut centroids = sums.clone();
        for (mut row, &count) in centroids.outer_iter_mut().zip(&self.counts) {
            if count > 0 {
                row /= count as f64;
            }
        }
        Some(centroids)
    }

    /// Fold one batch into the running class sums.
    pub fn absorb(&mut self, batch: &Batch) -> Result<()> {
        let features = flatten(&batch.inputs)?;
        if features.nrows() != batch.labels.nrows() {
            return Err(StrataError::shape(format!(
                "batch has {} input rows but {} label rows",
                features.nrows(),
                batch.labels.nrows()
            )));
        }
        let (num_classes, width) = (batch.labels.ncols(), features.ncols());

        let sums = self
            .sums
            .get_or_insert_with(|| Array2::zeros((num_classes, width)));
        if sums.dim() != (num_classes, width) {
            return Err(StrataError::shape(format!(
                "batch has {num_classes} classes x {width} features, classifier expects {:?}",
                sums.dim()
            )));
        }
        self.counts.resize(num_classes, 0);

        for (row, class) in features.outer_iter().zip(class_indices(batch.labels.view())?) {
            let mut sum = sums.row_mut(class);
            sum += &row;
            self.counts[class] += 1;
        }
        Ok(())
    }

    fn nearest(&self, centroids: &Array2<f64>, sample: ArrayView1<'_, f64>) -> usize {
        centroids
            .outer_iter()
            .enumerate()
            .filter(|(c, _)| self.counts[*c] > 0)
            .min_by_key(|(_, centroid)| {
                let diff: Array1<f64> = &sample - centroid;
                OrderedFloat(diff.dot(&diff))
            })
            .map(|(c, _)| c)
            .unwrap_or(0)
    }
}

impl Classifier for NearestCentroid {
    fn train(
        &mut self,
        source: &mut dyn BatchSource,
        epochs: usize,
        mut validation: Option<&mut dyn BatchSource>,
    ) -> Result<Vec<EpochMetrics>> {
        let steps = source.batches_per_epoch();
        let mut history = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            let mut correct = 0.0;
            let mut seen = 0usize;

            for step in 0..steps {
                let batch = source.next_batch()?;
                // Score before absorbing so training accuracy is not inflated.
                if self.is_trained() {
                    let m = self.evaluate(&batch.inputs, &batch.labels)?;
                    correct += m.accuracy * m.num_samples as f64;
                    seen += m.num_samples;
                }
                self.absorb(&batch)?;
                debug!(epoch, step, groups = batch.len(), "absorbed batch");
            }

            let train = Metrics {
                accuracy: if seen > 0 { correct / seen as f64 } else { 0.0 },
                num_samples: seen,
            };

            let validation_metrics = match validation.as_deref_mut() {
                Some(valid) => Some(score_epoch(self, valid)?),
                None => None,
            };

            info!(
                epoch,
                train_accuracy = train.accuracy,
                validation_accuracy = validation_metrics.map(|m| m.accuracy),
                "epoch finished"
            );

            history.push(EpochMetrics {
                epoch,
                train,
                validation: validation_metrics,
                recorded_at: chrono::Utc::now(),
            });
        }

        Ok(history)
    }

    fn predict(&self, inputs: &Array4<f64>) -> Result<Array2<f64>> {
        let centroids = match self.centroids() {
            Some(c) if self.is_trained() => c,
            _ => return Err(StrataError::config("classifier has not been trained")),
        };

        let features = flatten(inputs)?;
        if features.ncols() != centroids.ncols() {
            return Err(StrataError::shape(format!(
                "inputs have {} features per sample, classifier expects {}",
                features.ncols(),
                centroids.ncols()
            )));
        }

        let mut predicted = Array2::zeros((features.nrows(), centroids.nrows()));
        for (i, sample) in features.outer_iter().enumerate() {
            predicted[[i, self.nearest(&centroids, sample)]] = 1.0;
        }
        Ok(predicted)
    }
}

/// Score one epoch worth of batches from `source`.
fn score_epoch(model: &NearestCentroid, source: &mut dyn BatchSource) -> Result<Metrics> {
    let mut correct = 0.0;
    let mut total = 0usize;
    for _ in 0..source.batches_per_epoch() {
        let batch = source.next_batch()?;
        let m = model.evaluate(&batch.inputs, &batch.labels)?;
        correct += m.accuracy * m.num_samples as f64;
        total += m.num_samples;
    }
    Ok(Metrics {
        accuracy: if total > 0 { correct / total as f64 } else { 0.0 },
        num_samples: total,
    })
}

/// `[N, a, b, c]` -> `[N, a * b * c]`, copying into standard layout.
fn flatten(inputs: &Array4<f64>) -> Result<Array2<f64>> {
    let (n, a, b, c) = inputs.dim();
    Array2::from_shape_vec((n, a * b * c), inputs.iter().copied().collect())
        .map_err(|e| {
            StrataError::shape(format!("cannot flatten inputs of shape {:?}: {e}", inputs.shape()))
        })
}
