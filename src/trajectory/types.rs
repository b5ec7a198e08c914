//! Labelled trajectory data as it is stored on disk and handed to the
//! segmenter.
//!
//! A [`TrajectorySet`] is the serialisable form (one row per trajectory plus a
//! one-hot label row). [`TrajectorySet::to_arrays`] turns it into the dense
//! `[N, L]` trajectory matrix and `[N, C]` label matrix the rest of the crate
//! works with.

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

// ---------------------------------------------------------------------------
// Trajectory set
// ---------------------------------------------------------------------------

/// A collection of equal-length trajectories and their one-hot labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectorySet {
    /// Raw 1-D sequences, all of the same length.
    pub trajectories: Vec<Vec<f64>>,
    /// One-hot label rows, one per trajectory.
    pub labels: Vec<Vec<f64>>,
}

impl TrajectorySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trajectories.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    /// Whether the set holds no trajectories.
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Append one trajectory with its label row.
    pub fn push(&mut self, trajectory: Vec<f64>, label: Vec<f64>) {
        self.trajectories.push(trajectory);
        self.labels.push(label);
    }

    /// Number of classes, taken from the width of the first label row.
    pub fn num_classes(&self) -> usize {
        self.labels.first().map(|row| row.len()).unwrap_or(0)
    }

    /// Convert into dense `(trajectories [N, L], labels [N, C])` matrices.
    ///
    /// Fails with `InvalidShape` when rows are ragged or the two tables
    /// disagree on the number of samples.
    pub fn to_arrays(&self) -> Result<(Array2<f64>, Array2<f64>)> {
        if self.trajectories.len() != self.labels.len() {
            return Err(StrataError::shape(format!(
                "{} trajectories but {} label rows",
                self.trajectories.len(),
                self.labels.len()
            )));
        }

        let length = self.trajectories.first().map(|t| t.len()).unwrap_or(0);
        let inputs = stack_rows(&self.trajectories, length, "trajectory")?;
        let labels = stack_rows(&self.labels, self.num_classes(), "label")?;

        Ok((inputs, labels))
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Save the set as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a set previously written by [`save_to_file`](Self::save_to_file).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let set: Self = serde_json::from_str(&text)?;
        Ok(set)
    }
}

fn stack_rows(rows: &[Vec<f64>], width: usize, what: &str) -> Result<Array2<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(StrataError::shape(format!(
                "{what} row {i} has length {}, expected {width}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| StrataError::shape(format!("cannot build {what} matrix: {e}")))
}
