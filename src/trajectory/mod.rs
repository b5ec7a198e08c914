//! Trajectory data and its preparation for the batch generator.
//!
//! This module provides:
//! - [`types::TrajectorySet`] -- the serialisable set of raw trajectories and
//!   one-hot labels.
//! - [`segmenter`] -- cutting each trajectory into overlapping fixed-length
//!   pieces, producing the `[N, length_piece, num_pieces, 1]` tensor.
//! - [`labels`] -- arg-max class extraction, class counts, one-hot encoding,
//!   row gathers and the shuffled train/validation split.
//! - [`synthetic`] -- reproducible synthetic trajectories for demos and tests.

pub mod labels;
pub mod segmenter;
pub mod synthetic;
pub mod types;

// Re-export the most commonly used items at the module level.
pub use labels::{class_counts, class_indices, one_hot, select_rows, train_validation_split};
pub use segmenter::{segment, SegmentLayout};
pub use synthetic::synthetic;
pub use types::TrajectorySet;
