//! Batch sizing for class-stratified groups.
//!
//! A group needs `num_inputs` samples of the same class, so class `c`
//! contributes `floor(count_c / num_inputs)` groups and the epoch can hold at
//! most `G = sum_c floor(count_c / num_inputs)` of them. When `G` is smaller
//! than the requested batch size (or the request is unbounded) the whole epoch
//! becomes a single batch of `G` groups.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BatchSize;
use crate::error::{Result, StrataError};
use crate::trajectory::labels::{class_counts, class_indices};

/// The outcome of [`plan`]: how many batches of which size one epoch yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    /// Batches per epoch.
    pub num_batch: usize,
    /// Groups per batch actually used.
    pub batch_size: usize,
    /// The batch size that was asked for.
    pub requested: BatchSize,
    /// Whether `batch_size` ended up below the request.
    pub shrunk: bool,
    /// Complete groups available in each class.
    pub groups_per_class: Vec<usize>,
}

impl BatchPlan {
    /// Total complete groups over all classes (`G`).
    pub fn total_groups(&self) -> usize {
        self.groups_per_class.iter().sum()
    }

    /// Groups emitted per epoch.
    pub fn groups_per_epoch(&self) -> usize {
        self.num_batch * self.batch_size
    }

    /// Whether the plan produces no data at all.
    pub fn is_empty(&self) -> bool {
        self.num_batch == 0 || self.batch_size == 0
    }

    /// Emit the sizing diagnostics for this plan.
    pub fn log_summary(&self, verbose: bool) {
        if !verbose {
            return;
        }
        if self.is_empty() {
            warn!(
                groups_per_class = ?self.groups_per_class,
                "No complete group is available, no batch can be produced"
            );
        } else if self.shrunk {
            warn!(
                batch_size = self.batch_size,
                requested = %self.requested,
                "A single batch per epoch. The batch size is smaller than intended"
            );
        } else {
            info!(
                num_batch = self.num_batch,
                batch_size = self.batch_size,
                "batches per epoch"
            );
        }
    }
}

/// Size the batches for a one-hot `labels` matrix.
///
/// Pure and deterministic; the caller decides whether to report the result
/// via [`BatchPlan::log_summary`]. `G == 0` yields an empty plan rather than an
/// error.
pub fn plan(labels: ArrayView2<'_, f64>, num_inputs: usize, batch_size: BatchSize) -> Result<BatchPlan> {
    if num_inputs == 0 {
        return Err(StrataError::config("num_inputs must be at least 1"));
    }
    if batch_size == BatchSize::Fixed(0) {
        return Err(StrataError::config("batch_size must be positive"));
    }

    let classes = class_indices(labels)?;
    let groups_per_class: Vec<usize> = class_counts(&classes, labels.ncols())
        .into_iter()
        .map(|count| count / num_inputs)
        .collect();
    let total: usize = groups_per_class.iter().sum();

    let (num_batch, effective, shrunk) = match batch_size {
        _ if total == 0 => (0, 0, true),
        BatchSize::Unbounded => (1, total, true),
        BatchSize::Fixed(requested) if total < requested => (1, total, true),
        BatchSize::Fixed(requested) => (total / requested, requested, false),
    };

    Ok(BatchPlan {
        num_batch,
        batch_size: effective,
        requested: batch_size,
        shrunk,
        groups_per_class,
    })
}
