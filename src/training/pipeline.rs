//! Fit, evaluate and predict wrappers around a [`Classifier`].
//!
//! ```text
//! fit:
//!   1. Split samples into train / validation index sets
//!   2. Plan the training set with the requested batch size (verbose)
//!   3. Plan the validation set as one unbounded batch (silent)
//!   4. Build one stratified generator per subset
//!   5. Hand both to Classifier::train
//!
//! evaluate / predict:
//!   group every sample into a single unbounded batch, then score / predict it
//! ```
//!
//! All shape and configuration problems surface before the first batch is
//! built.

use ndarray::{Array2, Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::batching::{plan, Batch, BatchPlan, BatchSource, StratifiedBatchGenerator};
use crate::config::{BatchSize, StrataConfig};
use crate::error::{Result, StrataError};
use crate::trajectory::labels::{select_rows, train_validation_split};

use super::classifier::{Classifier, EpochMetrics, Metrics};

// ---------------------------------------------------------------------------
// Fit report
// ---------------------------------------------------------------------------

/// What [`fit`] did and what the classifier reported.
#[derive(Debug, Clone)]
pub struct FitReport {
    /// Per-epoch metrics returned by the classifier.
    pub history: Vec<EpochMetrics>,
    /// Sizing of the training generator.
    pub train_plan: BatchPlan,
    /// Sizing of the validation generator, if one was built.
    pub validation_plan: Option<BatchPlan>,
    /// Samples in the training subset.
    pub train_samples: usize,
    /// Samples in the validation subset.
    pub validation_samples: usize,
}

// ---------------------------------------------------------------------------
// Wrappers
// ---------------------------------------------------------------------------

/// Train `classifier` on stratified group batches drawn from `segments`.
///
/// `segments` is the `[N, length_piece, num_pieces, 1]` segmenter output and
/// `labels` the matching `[N, C]` one-hot matrix.
pub fn fit<C: Classifier + ?Sized>(
    classifier: &mut C,
    segments: &Array4<f64>,
    labels: &Array2<f64>,
    config: &StrataConfig,
) -> Result<FitReport> {
    config.validate()?;
    check_rows(segments, labels)?;

    let batching = &config.batching;
    let mut rng = seeded_rng(batching.seed);

    let (train_idx, valid_idx) =
        train_validation_split(labels.nrows(), config.training.validation_split, &mut rng);

    let train_labels = select_rows(labels, &train_idx)?;
    let train_plan = plan(train_labels.view(), batching.num_inputs, batching.batch_size)?;
    train_plan.log_summary(batching.verbose);
    if train_plan.is_empty() {
        return Err(empty_subset("training", batching.num_inputs, &train_plan));
    }

    let mut train_gen = StratifiedBatchGenerator::with_rng(
        select_rows(segments, &train_idx)?,
        train_labels,
        batching.num_inputs,
        train_plan.clone(),
        StdRng::seed_from_u64(rng.gen()),
    )?;

    let mut valid_gen = None;
    if !valid_idx.is_empty() {
        let valid_labels = select_rows(labels, &valid_idx)?;
        let valid_plan = plan(valid_labels.view(), batching.num_inputs, BatchSize::Unbounded)?;
        if valid_plan.is_empty() {
            warn!(
                samples = valid_idx.len(),
                groups_per_class = ?valid_plan.groups_per_class,
                "Validation subset has no complete group, skipping validation"
            );
        } else {
            valid_gen = Some(StratifiedBatchGenerator::with_rng(
                select_rows(segments, &valid_idx)?,
                valid_labels,
                batching.num_inputs,
                valid_plan,
                StdRng::seed_from_u64(rng.gen()),
            )?);
        }
    }

    info!(
        train_samples = train_idx.len(),
        validation_samples = valid_idx.len(),
        epochs = config.training.epochs,
        steps_per_epoch = train_gen.batches_per_epoch(),
        "Starting training"
    );

    let history = classifier.train(
        &mut train_gen,
        config.training.epochs,
        valid_gen.as_mut().map(|g| g as &mut dyn BatchSource),
    )?;

    Ok(FitReport {
        history,
        train_plan,
        validation_plan: valid_gen.map(|g| g.plan().clone()),
        train_samples: train_idx.len(),
        validation_samples: valid_idx.len(),
    })
}

/// Score `classifier` on every complete group that `segments` can form.
pub fn evaluate<C: Classifier + ?Sized>(
    classifier: &C,
    segments: &Array4<f64>,
    labels: &Array2<f64>,
    num_inputs: usize,
    seed: Option<u64>,
) -> Result<Metrics> {
    let batch = grouped_batch(segments, labels, num_inputs, seed, "evaluation")?;
    classifier.evaluate(&batch.inputs, &batch.labels)
}

/// Predict every complete group that `segments` can form.
///
/// Returns `(predictions, true_labels)`, row-aligned.
pub fn predict<C: Classifier + ?Sized>(
    classifier: &C,
    segments: &Array4<f64>,
    labels: &Array2<f64>,
    num_inputs: usize,
    seed: Option<u64>,
) -> Result<(Array2<f64>, Array2<f64>)> {
    let batch = grouped_batch(segments, labels, num_inputs, seed, "prediction")?;
    let predicted = classifier.predict(&batch.inputs)?;
    Ok((predicted, batch.labels))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Group all samples into one unbounded batch.
fn grouped_batch(
    segments: &Array4<f64>,
    labels: &Array2<f64>,
    num_inputs: usize,
    seed: Option<u64>,
    subset: &str,
) -> Result<Batch> {
    check_rows(segments, labels)?;
    let batch_plan = plan(labels.view(), num_inputs, BatchSize::Unbounded)?;
    if batch_plan.is_empty() {
        return Err(empty_subset(subset, num_inputs, &batch_plan));
    }

    let mut gen = StratifiedBatchGenerator::with_rng(
        segments.clone(),
        labels.clone(),
        num_inputs,
        batch_plan,
        seeded_rng(seed),
    )?;
    gen.next_batch()
}

fn check_rows(segments: &Array4<f64>, labels: &Array2<f64>) -> Result<()> {
    let n = segments.len_of(Axis(0));
    if n != labels.nrows() {
        return Err(StrataError::shape(format!(
            "{n} segmented samples but {} label rows",
            labels.nrows()
        )));
    }
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn empty_subset(subset: &str, num_inputs: usize, plan: &BatchPlan) -> StrataError {
    StrataError::config(format!(
        "{subset} set has no complete group of {num_inputs} same-class samples \
         (groups per class: {:?})",
        plan.groups_per_class
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::centroid::NearestCentroid;
    use crate::trajectory::labels::one_hot;
    use crate::trajectory::{segment, synthetic};

    fn prepared(counts: &[usize], seed: u64) -> (Array4<f64>, Array2<f64>) {
        let set = synthetic(counts, 48, &mut StdRng::seed_from_u64(seed));
        let (inputs, labels) = set.to_arrays().unwrap();
        (segment(&inputs, 2, 3).unwrap(), labels)
    }

    fn config(num_inputs: usize, batch_size: BatchSize) -> StrataConfig {
        let mut config = StrataConfig::default();
        config.batching.num_inputs = num_inputs;
        config.batching.batch_size = batch_size;
        config.batching.seed = Some(17);
        config.training.epochs = 4;
        config.training.validation_split = 0.25;
        config
    }

    #[test]
    fn test_fit_reports_plans_and_history() {
        let (segments, labels) = prepared(&[20, 20], 3);
        let mut model = NearestCentroid::new();
        let report = fit(&mut model, &segments, &labels, &config(2, BatchSize::Fixed(4))).unwrap();

        assert_eq!(report.train_samples, 30);
        assert_eq!(report.validation_samples, 10);
        assert_eq!(report.history.len(), 4);
        assert_eq!(report.train_plan.batch_size, 4);
        assert!(report.validation_plan.is_some());
        assert!(report.history.iter().all(|h| h.validation.is_some()));
        assert!(model.is_trained());
    }

    #[test]
    fn test_fit_without_validation() {
        let (segments, labels) = prepared(&[6, 6], 5);
        let mut cfg = config(1, BatchSize::Unbounded);
        cfg.training.validation_split = 0.0;

        let mut model = NearestCentroid::new();
        let report = fit(&mut model, &segments, &labels, &cfg).unwrap();
        assert_eq!(report.validation_samples, 0);
        assert!(report.validation_plan.is_none());
        assert_eq!(report.train_plan.batch_size, 12);
    }

    #[test]
    fn test_fit_rejects_training_set_without_groups() {
        let (segments, labels) = prepared(&[2, 2], 5);
        let mut model = NearestCentroid::new();
        let err = fit(&mut model, &segments, &labels, &config(4, BatchSize::Fixed(2))).unwrap_err();
        assert!(matches!(err, StrataError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("training set"));
    }

    #[test]
    fn test_fit_rejects_row_mismatch() {
        let (segments, _) = prepared(&[4, 4], 5);
        let labels = one_hot(&[0, 1, 0], 2).unwrap();
        let mut model = NearestCentroid::new();
        assert!(matches!(
            fit(&mut model, &segments, &labels, &config(1, BatchSize::Fixed(2))),
            Err(StrataError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_evaluate_and_predict_group_all_samples() {
        let (segments, labels) = prepared(&[9, 6], 8);
        let mut model = NearestCentroid::new();
        fit(&mut model, &segments, &labels, &config(3, BatchSize::Fixed(2))).unwrap();

        let metrics = evaluate(&model, &segments, &labels, 3, Some(1)).unwrap();
        assert_eq!(metrics.num_samples, 5);

        let (predicted, truth) = predict(&model, &segments, &labels, 3, Some(1)).unwrap();
        assert_eq!(predicted.dim(), (5, 2));
        assert_eq!(truth.dim(), (5, 2));
    }

    #[test]
    fn test_evaluate_rejects_empty_grouping() {
        let (segments, labels) = prepared(&[2, 1], 8);
        let mut model = NearestCentroid::new();
        let tiny = Batch {
            inputs: segments.clone(),
            labels: labels.clone(),
        };
        model.absorb(&tiny).unwrap();

        let err = evaluate(&model, &segments, &labels, 3, None).unwrap_err();
        assert!(err.to_string().contains("evaluation set"));
    }
}
