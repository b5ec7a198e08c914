//! Class-stratified group batches, produced one at a time.
//!
//! Every epoch the generator shuffles the sample order and sweeps through it
//! once. Each pulled sample is written into its class's group buffer; when a
//! class has collected `num_inputs` samples the buffer becomes the next batch
//! slot and that class starts over. Members sit side by side on the pieces
//! axis, so a group is `[length_piece, num_inputs * num_pieces, channels]`.
//!
//! ```text
//! epoch:
//!   shuffle indices, reset fill counters
//!   for batch in 0..num_batch:
//!     for slot in 0..batch_size:
//!       pull samples until some class fills a group -> slot
//!     yield batch
//! ```
//!
//! Partially filled groups are dropped at the end of the epoch.

use ndarray::{s, Array2, Array4};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{Result, StrataError};
use crate::trajectory::labels::class_indices;

use super::planner::BatchPlan;

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One batch of grouped samples with their one-hot labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[batch_size, length_piece, num_inputs * num_pieces, channels]`.
    pub inputs: Array4<f64>,
    /// `[batch_size, num_classes]`.
    pub labels: Array2<f64>,
}

impl Batch {
    /// Number of groups in the batch.
    pub fn len(&self) -> usize {
        self.labels.nrows()
    }

    /// Whether the batch holds no groups.
    pub fn is_empty(&self) -> bool {
        self.labels.nrows() == 0
    }

    /// Class index of every group.
    pub fn classes(&self) -> Result<Vec<usize>> {
        class_indices(self.labels.view())
    }
}

/// Anything that hands out training batches on demand.
pub trait BatchSource {
    /// Produce the next batch.
    fn next_batch(&mut self) -> Result<Batch>;

    /// How many batches make up one epoch.
    fn batches_per_epoch(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Endless producer of class-stratified batches.
///
/// Owns the segmented samples, its random state and all per-epoch cursors.
/// Not meant to be shared between callers.
pub struct StratifiedBatchGenerator<R: Rng = StdRng> {
    segments: Array4<f64>,
    labels: Array2<f64>,
    classes: Vec<usize>,
    num_inputs: usize,
    plan: BatchPlan,
    rng: R,
    permutation: Vec<usize>,
    cursor: usize,
    /// One group under construction per class.
    group_buffer: Array4<f64>,
    fill: Vec<usize>,
    epochs_started: usize,
    batch_in_epoch: usize,
}

impl StratifiedBatchGenerator<StdRng> {
    /// Create a generator with an entropy-seeded random state.
    pub fn new(
        segments: Array4<f64>,
        labels: Array2<f64>,
        num_inputs: usize,
        plan: BatchPlan,
    ) -> Result<Self> {
        Self::with_rng(segments, labels, num_inputs, plan, StdRng::from_entropy())
    }

    /// Create a generator whose epoch shuffles are reproducible.
    pub fn with_seed(
        segments: Array4<f64>,
        labels: Array2<f64>,
        num_inputs: usize,
        plan: BatchPlan,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(segments, labels, num_inputs, plan, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> StratifiedBatchGenerator<R> {
    /// Create a generator over `segments` (`[N, length_piece, num_pieces, C]`)
    /// and one-hot `labels` (`[N, classes]`), sized by `plan`.
    pub fn with_rng(
        segments: Array4<f64>,
        labels: Array2<f64>,
        num_inputs: usize,
        plan: BatchPlan,
        rng: R,
    ) -> Result<Self> {
        let (n, length_piece, num_pieces, channels) = segments.dim();
        if n != labels.nrows() {
            return Err(StrataError::shape(format!(
                "{n} segmented samples but {} label rows",
                labels.nrows()
            )));
        }
        if num_inputs == 0 {
            return Err(StrataError::config("num_inputs must be at least 1"));
        }
        if plan.is_empty() {
            return Err(StrataError::config(format!(
                "no complete group of {num_inputs} same-class samples is available \
                 (groups per class: {:?})",
                plan.groups_per_class
            )));
        }

        let classes = class_indices(labels.view())?;
        let num_classes = labels.ncols();
        let group_buffer = Array4::zeros((num_classes, length_piece, num_inputs * num_pieces, channels));

        Ok(Self {
            segments,
            labels,
            classes,
            num_inputs,
            rng,
            permutation: (0..n).collect(),
            cursor: 0,
            group_buffer,
            fill: vec![0; num_classes],
            epochs_started: 0,
            // Forces a fresh epoch on the first pull.
            batch_in_epoch: plan.num_batch,
            plan,
        })
    }

    /// The sizing this generator follows.
    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    /// Number of epochs begun so far.
    pub fn epochs_started(&self) -> usize {
        self.epochs_started
    }

    /// Shape of a single group: `(length_piece, num_inputs * num_pieces, channels)`.
    pub fn group_shape(&self) -> (usize, usize, usize) {
        let (_, length_piece, width, channels) = self.group_buffer.dim();
        (length_piece, width, channels)
    }

    /// Produce the next batch, starting a new epoch when the current one is
    /// used up.
    pub fn next_batch(&mut self) -> Result<Batch> {
        if self.batch_in_epoch >= self.plan.num_batch {
            self.start_epoch();
        }

        let (length_piece, width, channels) = self.group_shape();
        let batch_size = self.plan.batch_size;
        let mut inputs = Array4::zeros((batch_size, length_piece, width, channels));
        let mut labels = Array2::zeros((batch_size, self.labels.ncols()));

        for slot in 0..batch_size {
            let (class, last_sample) = self.fill_group(slot)?;
            inputs
                .slice_mut(s![slot, .., .., ..])
                .assign(&self.group_buffer.slice(s![class, .., .., ..]));
            labels.row_mut(slot).assign(&self.labels.row(last_sample));
        }

        self.batch_in_epoch += 1;
        Ok(Batch { inputs, labels })
    }

    fn start_epoch(&mut self) {
        self.permutation.shuffle(&mut self.rng);
        self.cursor = 0;
        self.fill.iter_mut().for_each(|f| *f = 0);
        self.batch_in_epoch = 0;
        self.epochs_started += 1;

        debug!(
            epoch = self.epochs_started - 1,
            samples = self.permutation.len(),
            num_batch = self.plan.num_batch,
            batch_size = self.plan.batch_size,
            "starting epoch"
        );
    }

    /// Pull samples until some class completes a group. Returns that class
    /// and the sample that completed it.
    fn fill_group(&mut self, slot: usize) -> Result<(usize, usize)> {
        let num_pieces = self.segments.shape()[2];
        loop {
            let Some(&sample) = self.permutation.get(self.cursor) else {
                return Err(StrataError::ExhaustedSource {
                    epoch: self.epochs_started.saturating_sub(1),
                    batch: self.batch_in_epoch,
                    slot,
                    consumed: self.cursor,
                });
            };
            self.cursor += 1;

            let class = self.classes[sample];
            let first = self.fill[class] * num_pieces;
            self.group_buffer
                .slice_mut(s![class, .., first..first + num_pieces, ..])
                .assign(&self.segments.slice(s![sample, .., .., ..]));
            self.fill[class] += 1;

            if self.fill[class] == self.num_inputs {
                self.fill[class] = 0;
                return Ok((class, sample));
            }
        }
    }
}

impl<R: Rng> BatchSource for StratifiedBatchGenerator<R> {
    fn next_batch(&mut self) -> Result<Batch> {
        StratifiedBatchGenerator::next_batch(self)
    }

    fn batches_per_epoch(&self) -> usize {
        self.plan.num_batch
    }
}

impl<R: Rng> Iterator for StratifiedBatchGenerator<R> {
    type Item = Result<Batch>;

    /// Never returns `None`; the stream restarts with a fresh shuffle after
    /// every epoch.
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_batch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::planner::plan;
    use crate::config::BatchSize;
    use crate::trajectory::labels::one_hot;

    const LENGTH_PIECE: usize = 2;
    const NUM_PIECES: usize = 3;

    /// Samples whose every entry equals the sample index, so each slice of a
    /// group can be traced back to its source.
    fn tagged_data(counts: &[usize]) -> (Array4<f64>, Array2<f64>, Vec<usize>) {
        let classes: Vec<usize> = counts
            .iter()
            .enumerate()
            .flat_map(|(c, &n)| std::iter::repeat(c).take(n))
            .collect();
        let n = classes.len();
        let segments = Array4::from_shape_fn((n, LENGTH_PIECE, NUM_PIECES, 1), |(i, _, _, _)| i as f64);
        let labels = one_hot(&classes, counts.len()).unwrap();
        (segments, labels, classes)
    }

    fn generator(
        counts: &[usize],
        num_inputs: usize,
        batch_size: BatchSize,
        seed: u64,
    ) -> (StratifiedBatchGenerator, Vec<usize>) {
        let (segments, labels, classes) = tagged_data(counts);
        let plan = plan(labels.view(), num_inputs, batch_size).unwrap();
        let gen = StratifiedBatchGenerator::with_seed(segments, labels, num_inputs, plan, seed).unwrap();
        (gen, classes)
    }

    /// Source sample indices of every member of group `slot`.
    fn members(batch: &Batch, slot: usize, num_inputs: usize) -> Vec<usize> {
        (0..num_inputs)
            .map(|k| batch.inputs[[slot, 0, k * NUM_PIECES, 0]] as usize)
            .collect()
    }

    #[test]
    fn test_batch_shapes() {
        let (mut gen, _) = generator(&[10, 3], 2, BatchSize::Fixed(4), 1);
        assert_eq!(gen.batches_per_epoch(), 1);

        let batch = gen.next_batch().unwrap();
        assert_eq!(batch.inputs.dim(), (4, LENGTH_PIECE, 2 * NUM_PIECES, 1));
        assert_eq!(batch.labels.dim(), (4, 2));
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn test_groups_are_single_class() {
        let num_inputs = 3;
        let (mut gen, classes) = generator(&[11, 7, 9], num_inputs, BatchSize::Fixed(2), 5);

        for _ in 0..20 {
            let batch = gen.next_batch().unwrap();
            let batch_classes = batch.classes().unwrap();
            for (slot, &class) in batch_classes.iter().enumerate() {
                let mut ids = members(&batch, slot, num_inputs);
                assert!(ids.iter().all(|&i| classes[i] == class));

                // Every piece column of a member carries the same sample.
                for k in 0..num_inputs {
                    let cols = batch.inputs.slice(s![slot, .., k * NUM_PIECES..(k + 1) * NUM_PIECES, 0]);
                    assert!(cols.iter().all(|&v| v as usize == ids[k]));
                }

                ids.sort_unstable();
                ids.dedup();
                assert_eq!(ids.len(), num_inputs);
            }
        }
    }

    #[test]
    fn test_epoch_visits_every_sample_once() {
        let counts = [4, 5, 3];
        let n: usize = counts.iter().sum();
        let (mut gen, _) = generator(&counts, 1, BatchSize::Unbounded, 3);

        for epoch in 0..3 {
            let batch = gen.next_batch().unwrap();
            assert_eq!(gen.epochs_started(), epoch + 1);
            let mut seen: Vec<usize> = (0..batch.len()).flat_map(|slot| members(&batch, slot, 1)).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_unbounded_batch_holds_every_complete_group() {
        let (mut gen, _) = generator(&[4, 2, 1], 2, BatchSize::Unbounded, 11);
        let batch = gen.next_batch().unwrap();
        let mut per_class = [0usize; 3];
        for c in batch.classes().unwrap() {
            per_class[c] += 1;
        }
        assert_eq!(per_class, [2, 1, 0]);
    }

    #[test]
    fn test_new_epoch_after_num_batch() {
        let (mut gen, _) = generator(&[12, 12], 2, BatchSize::Fixed(3), 2);
        assert_eq!(gen.plan().num_batch, 4);

        for _ in 0..4 {
            gen.next_batch().unwrap();
        }
        assert_eq!(gen.epochs_started(), 1);
        gen.next_batch().unwrap();
        assert_eq!(gen.epochs_started(), 2);
    }

    #[test]
    fn test_seeded_generators_agree() {
        let (a, _) = generator(&[6, 6], 2, BatchSize::Fixed(2), 42);
        let (b, _) = generator(&[6, 6], 2, BatchSize::Fixed(2), 42);
        let first: Vec<Batch> = a.take(5).collect::<Result<_>>().unwrap();
        let second: Vec<Batch> = b.take(5).collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inconsistent_plan_exhausts_source() {
        let (segments, labels, _) = tagged_data(&[3, 3]);
        let bogus = BatchPlan {
            num_batch: 1,
            batch_size: 4,
            requested: BatchSize::Fixed(4),
            shrunk: false,
            groups_per_class: vec![1, 1],
        };
        let mut gen = StratifiedBatchGenerator::with_seed(segments, labels, 2, bogus, 0).unwrap();
        match gen.next_batch() {
            Err(StrataError::ExhaustedSource { epoch, consumed, .. }) => {
                assert_eq!(epoch, 0);
                assert_eq!(consumed, 6);
            }
            other => panic!("expected ExhaustedSource, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_mismatched_counts() {
        let (segments, _, _) = tagged_data(&[3, 3]);
        let (_, labels, _) = tagged_data(&[3, 2]);
        let plan = plan(labels.view(), 1, BatchSize::Fixed(2)).unwrap();
        assert!(matches!(
            StratifiedBatchGenerator::with_seed(segments, labels, 1, plan, 0),
            Err(StrataError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_rejects_empty_plan() {
        let (segments, labels, _) = tagged_data(&[1, 1]);
        let plan = plan(labels.view(), 2, BatchSize::Fixed(2)).unwrap();
        assert!(matches!(
            StratifiedBatchGenerator::with_seed(segments, labels, 2, plan, 0),
            Err(StrataError::InvalidConfiguration(_))
        ));
    }
}
